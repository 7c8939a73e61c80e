//! Health check infrastructure for the AQI dashboard
//!
//! Tracks the dataset slot and the model providers and answers liveness and
//! readiness probes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Operational, but some requests will fail (e.g. a model is missing)
    Degraded,
    Unhealthy,
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max_by_key(|s| match s {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const DATASET_STORE: &str = "dataset_store";
    pub const MODEL_PROVIDER: &str = "model_provider";
}

/// Shared registry of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Reflect model load outcomes, keyed by schema, on the model provider
    /// component. Any failure degrades it.
    pub async fn record_model_loads<E: std::fmt::Display>(&self, outcomes: &[(&str, Result<(), E>)]) {
        let failures: Vec<String> = outcomes
            .iter()
            .filter_map(|(schema, result)| {
                result
                    .as_ref()
                    .err()
                    .map(|e| format!("{} model unavailable: {}", schema, e))
            })
            .collect();

        if failures.is_empty() {
            self.set_healthy(components::MODEL_PROVIDER).await;
        } else {
            self.set_degraded(components::MODEL_PROVIDER, failures.join("; "))
                .await;
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once initialized, unless a component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let reason = if !*self.ready.read().await {
            Some("Dashboard not yet initialized")
        } else if self.health().await.status == ComponentStatus::Unhealthy {
            Some("Critical component unhealthy")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_worst_component_wins() {
        let registry = HealthRegistry::new();
        registry.register(components::DATASET_STORE).await;
        registry.register(components::MODEL_PROVIDER).await;

        registry.set_degraded(components::MODEL_PROVIDER, "model missing").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.set_unhealthy(components::DATASET_STORE, "not writable").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_model_load_outcome_updates_provider_health() {
        let registry = HealthRegistry::new();
        registry.register(components::MODEL_PROVIDER).await;

        registry
            .record_model_loads(&[
                ("pollutants", Err("aqi_model.onnx not found".to_string())),
                ("lagged", Ok(())),
            ])
            .await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        let message = health.components[components::MODEL_PROVIDER]
            .message
            .clone()
            .unwrap();
        assert!(message.contains("pollutants"));
        assert!(!message.contains("lagged"));

        registry
            .record_model_loads::<String>(&[("pollutants", Ok(())), ("lagged", Ok(()))])
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_readiness_lifecycle() {
        let registry = HealthRegistry::new();
        registry.register(components::DATASET_STORE).await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());

        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);

        registry.set_unhealthy(components::DATASET_STORE, "not writable").await;
        assert!(!registry.readiness().await.ready);
    }
}
