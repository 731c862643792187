/// 数据模型

pub mod blog_post;
pub mod payment;
pub mod user;
