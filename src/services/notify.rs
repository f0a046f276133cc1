//! notify.rs
//!
//! Уведомление внешней системы о подтверждённом заказе.
//!
//! Ключевые компоненты:
//! 1.  **OrderNotifier**: HTTP-клиент, который отправляет подтверждение заказа
//!     на вебхук после коммита транзакции.
//! 2.  **Circuit Breaker** (`failsafe`): после серии подряд неудачных запросов
//!     вебхук временно не вызывается, чтобы недоступный получатель не копил
//!     зависшие задачи.
//!
//! Ошибка доставки никогда не влияет на сам заказ: он уже зафиксирован.

use failsafe::futures::CircuitBreaker;
use failsafe::{backoff, failure_policy, StateMachine};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::NotifyConfig;
use crate::models::Order;

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::Constant>, ()>;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("circuit breaker is open, webhook temporarily skipped")]
    CircuitOpen,

    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Тело запроса на вебхук.
#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation {
    pub order_id: Uuid,
    pub event_id: i64,
    pub buyer_email: String,
    pub total: f64,
    pub seat_ids: Vec<i64>,
}

impl From<&Order> for OrderConfirmation {
    fn from(order: &Order) -> Self {
        OrderConfirmation {
            order_id: order.id,
            event_id: order.event_id,
            buyer_email: order.buyer.email.clone(),
            total: order.total,
            seat_ids: order.seat_ids(),
        }
    }
}

pub struct OrderNotifier {
    http: reqwest::Client,
    url: String,
    breaker: Breaker,
}

impl OrderNotifier {
    pub fn new(url: impl Into<String>, failure_threshold: u32, backoff: Duration) -> Result<Self, NotifyError> {
        let policy = failure_policy::consecutive_failures(failure_threshold.max(1), backoff::constant(backoff));
        let breaker = failsafe::Config::new().failure_policy(policy).build();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { http, url: url.into(), breaker })
    }

    /// `None`, если вебхук не настроен.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, NotifyError> {
        match &config.webhook_url {
            Some(url) => Ok(Some(Self::new(
                url.clone(),
                config.failure_threshold,
                Duration::from_secs(config.backoff_seconds),
            )?)),
            None => Ok(None),
        }
    }

    pub async fn notify(&self, order: &Order) -> Result<(), NotifyError> {
        let payload = OrderConfirmation::from(order);

        let request = async {
            self.http
                .post(&self.url)
                .json(&payload)
                .send()
                .await?
                .error_for_status()
                .map(|_| ())
        };

        match self.breaker.call(request).await {
            Ok(()) => {
                info!("📨 Confirmation for order {} delivered", order.id);
                Ok(())
            }
            Err(failsafe::Error::Rejected) => {
                warn!("Circuit breaker is OPEN - skipping confirmation for order {}", order.id);
                Err(NotifyError::CircuitOpen)
            }
            Err(failsafe::Error::Inner(e)) => Err(NotifyError::Http(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Buyer, OrderItem, OrderStatus};
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            event_id: 7,
            buyer: Buyer { name: "Ann".into(), email: "ann@example.com".into() },
            user_id: None,
            promo_code: None,
            subtotal: 200.0,
            discount: 0.0,
            total: 200.0,
            status: OrderStatus::Pending,
            items: vec![
                OrderItem { seat_id: 1, price: 100.0 },
                OrderItem { seat_id: 2, price: 100.0 },
            ],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn posts_confirmation_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/orders"))
            .and(body_partial_json(serde_json::json!({
                "event_id": 7,
                "buyer_email": "ann@example.com",
                "seat_ids": [1, 2],
                "total": 200.0
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = OrderNotifier::new(format!("{}/hooks/orders", server.uri()), 3, Duration::from_secs(60)).unwrap();
        notifier.notify(&order()).await.unwrap();
    }

    #[tokio::test]
    async fn opens_circuit_after_consecutive_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let notifier = OrderNotifier::new(server.uri(), 2, Duration::from_secs(60)).unwrap();

        assert!(matches!(notifier.notify(&order()).await, Err(NotifyError::Http(_))));
        assert!(matches!(notifier.notify(&order()).await, Err(NotifyError::Http(_))));
        assert!(matches!(notifier.notify(&order()).await, Err(NotifyError::CircuitOpen)));
    }

    #[test]
    fn disabled_without_url() {
        let config = NotifyConfig { webhook_url: None, failure_threshold: 5, backoff_seconds: 60 };
        assert!(OrderNotifier::from_config(&config).unwrap().is_none());
    }
}
