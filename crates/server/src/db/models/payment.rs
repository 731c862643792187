/// 支付记录数据模型
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 支付模型
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    /// 金额，以最小货币单位计（分）
    pub amount: i64,
    pub currency: String,
    pub provider: String, // wechat, alipay, stripe, paypal
    pub status: String,   // pending, completed, failed
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// 支付渠道
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Wechat,
    Alipay,
    /// Visa/Mastercard 信用卡
    Stripe,
    Paypal,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Wechat => "wechat",
            PaymentProvider::Alipay => "alipay",
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Paypal => "paypal",
        }
    }
}

impl FromStr for PaymentProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wechat" => Ok(PaymentProvider::Wechat),
            "alipay" => Ok(PaymentProvider::Alipay),
            "stripe" => Ok(PaymentProvider::Stripe),
            "paypal" => Ok(PaymentProvider::Paypal),
            other => Err(format!("Unsupported payment provider: {}", other)),
        }
    }
}

/// 支付状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// 创建支付会话 DTO
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionDto {
    pub provider: String,
    pub amount: i64,
    pub currency: String,
}

/// 支付会话响应，渠道侧参数由各渠道接入后补充
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSessionResponse {
    pub payment_id: i32,
    pub provider: PaymentProvider,
}

/// 渠道回调中本服务关心的字段
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub payment_id: Option<i32>,
    pub status: Option<PaymentStatus>,
}

/// 支付记录响应 DTO
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: i32,
    pub user_id: i32,
    pub amount: i64,
    pub currency: String,
    pub provider: String,
    pub status: String,
    pub created_at: String,
}

impl From<Model> for PaymentResponse {
    fn from(payment: Model) -> Self {
        Self {
            id: payment.id,
            user_id: payment.user_id,
            amount: payment.amount,
            currency: payment.currency,
            provider: payment.provider,
            status: payment.status,
            created_at: payment.created_at.to_rfc3339(),
        }
    }
}
