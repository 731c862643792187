/// 博客文章服务
use sea_orm::{EntityTrait, QueryOrder};

use super::ServiceResult;
use crate::app_state::AppState;
use crate::db::models::blog_post::{
    BlogPostResponse, Column as BlogPostColumn, Entity as BlogPostEntity,
};

pub struct BlogService {
    state: AppState,
}

impl BlogService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 全部文章，最新发布的在前
    pub async fn list_posts(&self) -> ServiceResult<Vec<BlogPostResponse>> {
        let posts = BlogPostEntity::find()
            .order_by_desc(BlogPostColumn::CreatedAt)
            .order_by_desc(BlogPostColumn::Id)
            .all(&self.state.sea_db())
            .await?;

        Ok(posts.into_iter().map(BlogPostResponse::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::test_state;
    use crate::db::models::blog_post::ActiveModel as BlogPostActiveModel;
    use chrono::{Duration, Utc};
    use sea_orm::{ActiveModelTrait, Set};

    async fn insert_post(state: &AppState, slug: &str, age_days: i64) {
        let created = Utc::now() - Duration::days(age_days);
        BlogPostActiveModel {
            title: Set(slug.to_uppercase()),
            content: Set(format!("content of {}", slug)),
            author_id: Set(None),
            is_premium: Set(false),
            slug: Set(slug.to_string()),
            language: Set("en".to_string()),
            created_at: Set(created.into()),
            updated_at: Set(created.into()),
            ..Default::default()
        }
        .insert(&state.sea_db())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_posts_newest_first() {
        let state = test_state().await;
        insert_post(&state, "middle", 5).await;
        insert_post(&state, "oldest", 10).await;
        insert_post(&state, "newest", 1).await;

        let posts = BlogService::new(state).list_posts().await.unwrap();
        let slugs: Vec<&str> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn test_no_posts() {
        let posts = BlogService::new(test_state().await).list_posts().await.unwrap();
        assert!(posts.is_empty());
    }
}
