/// 运营数据统计服务
use chrono::{Duration, NaiveDate, Utc};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::ServiceResult;
use crate::app_state::AppState;
use crate::db::models::payment::{Column as PaymentColumn, Entity as PaymentEntity, PaymentStatus};
use crate::db::models::user::Entity as UserEntity;

/// 时间序列覆盖的天数
const SERIES_DAYS: i64 = 30;

/// 估算访问量时每个用户的平均访问次数
const VISITS_PER_USER: u64 = 3;

/// 每日数据点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub revenue: i64,
    /// 当日有支付记录的去重用户数
    pub visits: u64,
}

/// 用户类型分布
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTypeShare {
    pub name: String,
    pub value: u64,
}

/// 管理后台概览
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalytics {
    pub visits: u64,
    /// 已完成支付的总金额
    pub revenue: i64,
    pub users: u64,
    /// 付费用户占比（百分比）
    pub conversion_rate: f64,
    pub time_series_data: Vec<DailyPoint>,
    pub user_types: Vec<UserTypeShare>,
}

pub struct AnalyticsService {
    state: AppState,
}

impl AnalyticsService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn dashboard(&self) -> ServiceResult<DashboardAnalytics> {
        let db = &self.state.sea_db();

        let users = UserEntity::find().count(db).await?;

        let completed: Vec<(i32, i64)> = PaymentEntity::find()
            .select_only()
            .column(PaymentColumn::UserId)
            .column(PaymentColumn::Amount)
            .filter(PaymentColumn::Status.eq(PaymentStatus::Completed.as_str()))
            .into_tuple()
            .all(db)
            .await?;

        let revenue: i64 = completed.iter().map(|(_, amount)| amount).sum();
        let paying_users = completed
            .iter()
            .map(|(user_id, _)| *user_id)
            .collect::<HashSet<_>>()
            .len() as u64;

        let conversion_rate = if users > 0 {
            paying_users as f64 / users as f64 * 100.0
        } else {
            0.0
        };

        let since: DateTimeWithTimeZone = (Utc::now() - Duration::days(SERIES_DAYS)).into();
        let recent: Vec<(DateTimeWithTimeZone, i64, i32)> = PaymentEntity::find()
            .select_only()
            .column(PaymentColumn::CreatedAt)
            .column(PaymentColumn::Amount)
            .column(PaymentColumn::UserId)
            .filter(PaymentColumn::CreatedAt.gte(since))
            .into_tuple()
            .all(db)
            .await?;

        Ok(DashboardAnalytics {
            visits: users * VISITS_PER_USER,
            revenue,
            users,
            conversion_rate,
            time_series_data: daily_series(&recent),
            user_types: vec![
                UserTypeShare {
                    name: "Premium".to_string(),
                    value: paying_users,
                },
                UserTypeShare {
                    name: "Free".to_string(),
                    value: users.saturating_sub(paying_users),
                },
            ],
        })
    }
}

/// 按 UTC 日期聚合，日期升序
fn daily_series(payments: &[(DateTimeWithTimeZone, i64, i32)]) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, (i64, HashSet<i32>)> = BTreeMap::new();
    for (created_at, amount, user_id) in payments {
        let day = days.entry(created_at.naive_utc().date()).or_default();
        day.0 += amount;
        day.1.insert(*user_id);
    }

    days.into_iter()
        .map(|(date, (revenue, users))| DailyPoint {
            date,
            revenue,
            visits: users.len() as u64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::test_state;
    use crate::db::models::payment::ActiveModel as PaymentActiveModel;
    use crate::services::test_support::create_user;
    use sea_orm::{ActiveModelTrait, Set};

    async fn insert_payment(state: &AppState, user_id: i32, amount: i64, status: PaymentStatus, age_days: i64) {
        let created = Utc::now() - Duration::days(age_days);
        PaymentActiveModel {
            user_id: Set(user_id),
            amount: Set(amount),
            currency: Set("USD".to_string()),
            provider: Set("stripe".to_string()),
            status: Set(status.as_str().to_string()),
            created_at: Set(created.into()),
            updated_at: Set(created.into()),
            ..Default::default()
        }
        .insert(&state.sea_db())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_empty_dashboard() {
        let analytics = AnalyticsService::new(test_state().await).dashboard().await.unwrap();
        assert_eq!(analytics.users, 0);
        assert_eq!(analytics.revenue, 0);
        assert_eq!(analytics.conversion_rate, 0.0);
        assert!(analytics.time_series_data.is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_totals() {
        let state = test_state().await;
        let a = create_user(&state, "a").await;
        let b = create_user(&state, "b").await;
        create_user(&state, "c").await;
        create_user(&state, "d").await;

        insert_payment(&state, a.id, 1000, PaymentStatus::Completed, 1).await;
        insert_payment(&state, a.id, 500, PaymentStatus::Completed, 40).await;
        insert_payment(&state, b.id, 700, PaymentStatus::Pending, 1).await;

        let analytics = AnalyticsService::new(state).dashboard().await.unwrap();
        assert_eq!(analytics.users, 4);
        assert_eq!(analytics.visits, 12);
        assert_eq!(analytics.revenue, 1500);
        assert_eq!(analytics.conversion_rate, 25.0);
        assert_eq!(
            analytics.user_types,
            vec![
                UserTypeShare { name: "Premium".to_string(), value: 1 },
                UserTypeShare { name: "Free".to_string(), value: 3 },
            ]
        );

        // 40 天前的支付不在序列里，待支付的计入
        let total: i64 = analytics.time_series_data.iter().map(|p| p.revenue).sum();
        assert_eq!(total, 1700);
    }

    #[test]
    fn test_daily_series_groups_by_day() {
        let day = |d: u32, h: u32| -> DateTimeWithTimeZone {
            NaiveDate::from_ymd_opt(2024, 3, d)
                .and_then(|date| date.and_hms_opt(h, 0, 0))
                .map(|dt| dt.and_utc().into())
                .unwrap()
        };

        let series = daily_series(&[
            (day(2, 9), 100, 1),
            (day(1, 8), 50, 1),
            (day(2, 20), 300, 2),
            (day(2, 21), 10, 1),
        ]);

        assert_eq!(
            series,
            vec![
                DailyPoint {
                    date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                    revenue: 50,
                    visits: 1,
                },
                DailyPoint {
                    date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                    revenue: 410,
                    visits: 2,
                },
            ]
        );
    }
}
