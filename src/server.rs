use std::sync::Arc;

use crate::config::Config;
use crate::onboarding::OnboardingService;
use crate::onboarding::sequencer::Step;
use crate::session::Session;
use crate::store::{self, ProfileStore};
use anyhow::{Context, Result};
use rmcp::model::CallToolResult;
use serde::Deserialize;

pub type ToolArgs = Option<serde_json::Map<String, serde_json::Value>>;

#[derive(Debug, Deserialize)]
struct ResolveArgs {
    user_id: String,
    #[serde(default)]
    step: Option<u8>,
}

#[derive(Clone)]
pub struct OnboardingMcp {
    pub service: Arc<OnboardingService>,
    pub cfg: Config,
}

impl OnboardingMcp {
    pub async fn new(cfg: Config) -> Result<Self> {
        let store = store::open(&cfg).await?;
        Ok(Self::with_store(store, cfg))
    }

    pub fn with_store(store: Arc<dyn ProfileStore>, cfg: Config) -> Self {
        let service = Arc::new(OnboardingService::from_config(store, &cfg));
        Self { service, cfg }
    }

    /// Store connectivity + config surface.
    pub async fn handle_health(&self, _args: ToolArgs) -> Result<CallToolResult> {
        let store_ok = self.service.ping().await.unwrap_or(false);
        let body = serde_json::json!({
            "store": store_ok,
            "backend": format!("{:?}", self.cfg.store).to_lowercase(),
            "namespace": self.cfg.db_namespace,
            "database": self.cfg.db_name,
        });
        Ok(CallToolResult::structured(body))
    }

    /// Table counts plus the post-create consistency failure counter.
    pub async fn handle_status(&self, _args: ToolArgs) -> Result<CallToolResult> {
        let stats = self.service.stats().await.unwrap_or_default();
        let body = serde_json::json!({
            "profiles": stats.profiles,
            "players": stats.players,
            "parents": stats.parents,
            "parent_links": stats.parent_links,
            "consistency_failures": self.service.consistency_failures(),
            "cached_intents": self.service.intents().len(),
        });
        Ok(CallToolResult::structured(body))
    }

    /// Where `user_id` belongs in the flow, as the web client would see it.
    pub async fn handle_resolve_step(&self, args: ToolArgs) -> Result<CallToolResult> {
        let args: ResolveArgs =
            serde_json::from_value(serde_json::Value::Object(args.unwrap_or_default()))
                .context("resolve_step expects {\"user_id\": string, \"step\"?: 1-7}")?;
        let step = args.step.and_then(Step::new).unwrap_or(Step::FIRST);
        let session = Session::new(args.user_id);
        let resolution = self.service.resolve(Some(&session), step).await;
        Ok(CallToolResult::structured(serde_json::to_value(resolution)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::models::{ProfilePatch, Role, UserId};
    use crate::store::MemoryStore;

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned()
    }

    async fn server_with_player() -> OnboardingMcp {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_profile(
                &UserId("p1".into()),
                &ProfilePatch {
                    role: Some(Role::Player),
                    username: Some("jdoe".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        OnboardingMcp::with_store(store, Config::default())
    }

    #[tokio::test]
    async fn resolve_step_redirects_a_player_without_hudl() {
        let server = server_with_player().await;
        let res = server
            .handle_resolve_step(args(serde_json::json!({ "user_id": "p1", "step": 2 })))
            .await
            .unwrap();
        let body = res.structured_content.unwrap();
        assert_eq!(body["action"]["kind"], "redirect");
        assert_eq!(body["action"]["step"], 4);
        assert_eq!(body["account"], "player");
    }

    #[tokio::test]
    async fn resolve_step_requires_a_user() {
        let server = server_with_player().await;
        assert!(server.handle_resolve_step(None).await.is_err());
    }

    #[tokio::test]
    async fn status_reports_counts() {
        let server = server_with_player().await;
        let body = server.handle_status(None).await.unwrap().structured_content.unwrap();
        assert_eq!(body["profiles"], 1);
        assert_eq!(body["players"], 1);
        assert_eq!(body["consistency_failures"], 0);
    }
}
