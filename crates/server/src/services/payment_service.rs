/// 支付服务
///
/// 各支付渠道尚未接入，创建会话只落库一条 pending 记录，回调只更新状态
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{info, warn};

use super::{ServiceError, ServiceResult};
use crate::app_state::AppState;
use crate::db::models::payment::{
    ActiveModel as PaymentActiveModel, Column as PaymentColumn, CreateSessionDto,
    Entity as PaymentEntity, PaymentProvider, PaymentResponse, PaymentSessionResponse,
    PaymentStatus, WebhookEvent,
};

pub struct PaymentService {
    state: AppState,
}

impl PaymentService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 创建支付会话
    pub async fn create_session(
        &self,
        user_id: i32,
        dto: CreateSessionDto,
    ) -> ServiceResult<PaymentSessionResponse> {
        let db = &self.state.sea_db();

        let provider: PaymentProvider = dto.provider.parse().map_err(ServiceError::BadRequest)?;
        if dto.amount <= 0 {
            return Err(ServiceError::BadRequest("Amount must be positive".to_string()));
        }
        let currency = dto.currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(ServiceError::BadRequest("Currency is required".to_string()));
        }

        let now = Utc::now();
        let payment = PaymentActiveModel {
            user_id: Set(user_id),
            amount: Set(dto.amount),
            currency: Set(currency),
            provider: Set(provider.as_str().to_string()),
            status: Set(PaymentStatus::Pending.as_str().to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(
            "创建支付会话: payment_id={}, user_id={}, provider={}, amount={} {}",
            payment.id, user_id, payment.provider, payment.amount, payment.currency
        );

        Ok(PaymentSessionResponse {
            payment_id: payment.id,
            provider,
        })
    }

    /// 处理渠道回调，返回是否更新了支付状态
    pub async fn handle_webhook(
        &self,
        provider: &str,
        event: WebhookEvent,
    ) -> ServiceResult<bool> {
        let db = &self.state.sea_db();

        let provider: PaymentProvider = provider
            .parse()
            .map_err(|_| ServiceError::BadRequest("Invalid payment provider".to_string()))?;

        let (payment_id, status) = match (event.payment_id, event.status) {
            (Some(payment_id), Some(status)) if status != PaymentStatus::Pending => {
                (payment_id, status)
            }
            _ => {
                info!("收到 {} 回调，无状态变更", provider.as_str());
                return Ok(false);
            }
        };

        let payment = PaymentEntity::find_by_id(payment_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("支付记录不存在: {}", payment_id)))?;

        if payment.provider != provider.as_str() {
            warn!(
                "回调渠道不匹配: payment_id={}, expected={}, got={}",
                payment_id, payment.provider, provider.as_str()
            );
            return Err(ServiceError::BadRequest("Payment provider mismatch".to_string()));
        }

        let mut active: PaymentActiveModel = payment.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;

        info!("支付状态更新: payment_id={}, status={}", payment_id, status.as_str());
        Ok(true)
    }

    /// 用户支付记录，最新的在前
    pub async fn history(&self, user_id: i32) -> ServiceResult<Vec<PaymentResponse>> {
        let db = &self.state.sea_db();

        let payments = PaymentEntity::find()
            .filter(PaymentColumn::UserId.eq(user_id))
            .order_by_desc(PaymentColumn::CreatedAt)
            .order_by_desc(PaymentColumn::Id)
            .all(db)
            .await?;

        Ok(payments.into_iter().map(PaymentResponse::from).collect())
    }
}
