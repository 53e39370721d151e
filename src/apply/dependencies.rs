// src/apply/dependencies.rs

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    cancellation::ensure_not_cancelled,
    errors::EngineResult,
    models::{DependencyKind, RawValue, SettingApplicationRequest, SettingDefinition},
};

/// Works out which other settings have to be applied before `setting`.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    async fn resolve(
        &self,
        setting: &SettingDefinition,
        enable: bool,
        token: &CancellationToken,
    ) -> EngineResult<Vec<SettingApplicationRequest>>;
}

/// Turns the setting's declared dependencies into apply requests.
///
/// Only enabling pulls in dependencies. The requests skip their own
/// prerequisites so resolution never recurses.
#[derive(Debug, Default)]
pub struct DeclaredDependencyResolver;

#[async_trait]
impl DependencyResolver for DeclaredDependencyResolver {
    async fn resolve(
        &self,
        setting: &SettingDefinition,
        enable: bool,
        token: &CancellationToken,
    ) -> EngineResult<Vec<SettingApplicationRequest>> {
        ensure_not_cancelled(token)?;
        if !enable || setting.dependencies.is_empty() {
            return Ok(Vec::new());
        }

        let requests = setting
            .dependencies
            .iter()
            .map(|dependency| {
                let id = dependency.required_setting_id.as_str();
                let request = match dependency.kind {
                    DependencyKind::RequiresEnabled => SettingApplicationRequest::toggle(id, true),
                    DependencyKind::RequiresDisabled => SettingApplicationRequest::toggle(id, false),
                    DependencyKind::RequiresValue(value) => SettingApplicationRequest {
                        setting_id: id.to_string(),
                        enable: true,
                        value: Some(RawValue::Int(value)),
                        ..Default::default()
                    },
                };
                SettingApplicationRequest {
                    skip_value_prerequisites: true,
                    ..request
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "{:?} -> Resolved {} dependencies",
            setting.id,
            requests.len()
        );
        Ok(requests)
    }
}
