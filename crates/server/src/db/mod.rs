/// 数据库访问层

pub mod models;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

use models::{blog_post, payment, user};

/// 建立数据库连接 (SeaORM)
pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, anyhow::Error> {
    info!("正在连接数据库: {}", database_url);

    let db = Database::connect(database_url).await?;
    info!("数据库连接成功");

    Ok(db)
}

/// 按实体定义建表，已存在的表保持不变
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    // users 被其他表引用，需要先建
    create_table(db, user::Entity).await?;
    create_table(db, payment::Entity).await?;
    create_table(db, blog_post::Entity).await?;

    info!("数据表检查完成");
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;

    Ok(())
}
