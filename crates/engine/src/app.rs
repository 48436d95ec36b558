//! Application state and composition.

use std::sync::Arc;

use crate::api::connections::SessionRegistry;
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::ports::{
    ClockPort, ContentRepo, GenerationPort, PlatformAdapter, TokenVerifier,
};
use crate::use_cases::content::ContentLifecycle;
use crate::use_cases::generation::{GenerateContent, GenerationSettings};
use crate::use_cases::publishing::{
    adapter_registry, DispatchSettings, PublishContent, UnpublishContent,
};
use crate::use_cases::scheduling::{ScheduleContent, SchedulerSweep};

/// Main application state.
///
/// Passed to HTTP and WebSocket handlers via Axum state.
pub struct App {
    pub lifecycle: Arc<ContentLifecycle>,
    pub sessions: Arc<SessionRegistry>,
    pub auth: Arc<dyn TokenVerifier>,
    pub use_cases: UseCases,
}

/// Container for all use cases.
pub struct UseCases {
    pub generate: Arc<GenerateContent>,
    pub publish: Arc<PublishContent>,
    pub unpublish: Arc<UnpublishContent>,
    pub schedule: Arc<ScheduleContent>,
    pub sweep: Arc<SchedulerSweep>,
}

/// Tunables for the use cases, usually derived from `EngineConfig`.
#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    pub generation: GenerationSettings,
    pub dispatch: DispatchSettings,
}

impl From<&EngineConfig> for AppSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            generation: GenerationSettings {
                max_tokens: config.generation.max_tokens,
                idle_timeout: config.generation.idle_timeout,
                ..GenerationSettings::default()
            },
            dispatch: DispatchSettings {
                retry: config.publish.retry(),
                adapter_timeout: config.publish.adapter_timeout,
                allow_redispatch: config.publish.allow_redispatch,
            },
        }
    }
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(
        repo: Arc<dyn ContentRepo>,
        generator: Arc<dyn GenerationPort>,
        adapters: Vec<Arc<dyn PlatformAdapter>>,
        auth: Arc<dyn TokenVerifier>,
        clock: Arc<dyn ClockPort>,
        settings: AppSettings,
    ) -> Self {
        let lifecycle = Arc::new(ContentLifecycle::new(repo.clone(), clock.clone()));
        let sessions = Arc::new(SessionRegistry::new(clock.clone()));
        let adapters = Arc::new(adapter_registry(adapters));

        let generate = Arc::new(GenerateContent::new(
            lifecycle.clone(),
            generator,
            sessions.clone(),
            settings.generation,
        ));
        let publish = Arc::new(PublishContent::new(
            lifecycle.clone(),
            adapters.clone(),
            settings.dispatch.clone(),
        ));
        let unpublish = Arc::new(UnpublishContent::new(
            lifecycle.clone(),
            adapters,
            settings.dispatch,
        ));
        let schedule = Arc::new(ScheduleContent::new(lifecycle.clone()));
        let sweep = Arc::new(SchedulerSweep::new(
            repo,
            lifecycle.clone(),
            publish.clone(),
            clock,
        ));

        Self {
            lifecycle,
            sessions,
            auth,
            use_cases: UseCases {
                generate,
                publish,
                unpublish,
                schedule,
                sweep,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infrastructure::auth::StaticTokenVerifier;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::memory_store::InMemoryContentRepo;
    use std::collections::HashMap;
    use quillcast_domain::UserId;

    /// In-memory app with one known token, `"secret"`, for `user`.
    pub(crate) fn test_app(
        generator: Arc<dyn GenerationPort>,
        adapters: Vec<Arc<dyn PlatformAdapter>>,
        user: UserId,
    ) -> Arc<App> {
        let tokens = HashMap::from([("secret".to_string(), user)]);
        Arc::new(App::new(
            Arc::new(InMemoryContentRepo::new()),
            generator,
            adapters,
            Arc::new(StaticTokenVerifier::new(tokens)),
            Arc::new(SystemClock::new()),
            AppSettings::default(),
        ))
    }

    #[test]
    fn settings_follow_config() {
        let config = EngineConfig::from_lookup(|key| match key {
            "GENERATION_MAX_TOKENS" => Some("500".into()),
            "ALLOW_REDISPATCH" => Some("false".into()),
            "PUBLISH_MAX_ATTEMPTS" => Some("4".into()),
            _ => None,
        });
        let settings = AppSettings::from(&config);
        assert_eq!(settings.generation.max_tokens, 500);
        assert!(!settings.dispatch.allow_redispatch);
        assert_eq!(settings.dispatch.retry.max_attempts, 4);
    }
}
