//! Name resolution: manifest entries to live function names.
//!
//! All entries are looked up concurrently and the step is all-or-nothing:
//! one failed lookup fails the whole invocation.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_cloudformation::error::DisplayErrorContext as CfnErrorContext;
use aws_sdk_lambda::error::DisplayErrorContext as LambdaErrorContext;
use tokio::task::JoinSet;

use super::context::AwsContext;
use super::error::{AwsError, AwsResult};
use crate::manifest::{LambdaEntry, Manifest};

/// Live identity of one deployed function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFunction {
    pub function_name: String,
    /// Names of the layers currently attached.
    pub layers: Vec<String>,
}

/// A manifest entry bound to its deployed function.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub key: String,
    pub entry: LambdaEntry,
    pub function_name: String,
    pub layers: Vec<String>,
}

impl ResolvedTarget {
    /// The recorded dependency layer version, when the live function lacks it.
    pub fn stale_layer(&self) -> Option<&str> {
        let expected = self.entry.node_modules_layer_version.as_deref()?;
        (!self.layers.iter().any(|layer| layer == expected)).then_some(expected)
    }
}

/// Looks up the deployed function behind a manifest entry.
#[async_trait]
pub trait FunctionResolver: Send + Sync {
    async fn resolve(&self, key: &str, entry: &LambdaEntry) -> AwsResult<ResolvedFunction>;
}

/// Resolve every entry of `manifest` concurrently, in manifest order.
///
/// The first failure aborts the outstanding lookups and is returned.
pub async fn resolve_targets(
    resolver: Arc<dyn FunctionResolver>,
    manifest: &Manifest,
) -> AwsResult<Vec<ResolvedTarget>> {
    let mut lookups = JoinSet::new();
    for (index, (key, entry)) in manifest.lambdas.iter().enumerate() {
        let resolver = Arc::clone(&resolver);
        let key = key.clone();
        let entry = entry.clone();
        lookups.spawn(async move {
            let result = resolver.resolve(&key, &entry).await;
            (index, key, entry, result)
        });
    }

    let mut resolved = Vec::with_capacity(manifest.len());
    while let Some(joined) = lookups.join_next().await {
        let (index, key, entry, result) = joined.map_err(|e| AwsError::Join(e.to_string()))?;
        match result {
            Ok(function) => {
                crate::debug_event!("resolve", "resolved", "{key} -> {}", function.function_name);
                resolved.push((
                    index,
                    ResolvedTarget {
                        key,
                        entry,
                        function_name: function.function_name,
                        layers: function.layers,
                    },
                ));
            }
            Err(source) => {
                lookups.abort_all();
                return Err(AwsError::Resolution {
                    key,
                    source: Box::new(source),
                });
            }
        }
    }

    resolved.sort_by_key(|(index, _)| *index);
    Ok(resolved.into_iter().map(|(_, target)| target).collect())
}

/// `arn:aws:lambda:<region>:<account>:layer:<name>:<version>` -> `<name>`.
pub fn layer_name_from_arn(arn: &str) -> Option<&str> {
    let mut parts = arn.split(':');
    match (parts.nth(5), parts.next()) {
        (Some("layer"), Some(name)) if !name.is_empty() => Some(name),
        _ => None,
    }
}

/// Resolves through CloudFormation stack resources and Lambda metadata.
pub struct AwsFunctionResolver {
    cloudformation: aws_sdk_cloudformation::Client,
    lambda: aws_sdk_lambda::Client,
}

impl AwsFunctionResolver {
    pub async fn new(context: &AwsContext) -> Self {
        let config = context.sdk_config().await;
        Self {
            cloudformation: aws_sdk_cloudformation::Client::new(&config),
            lambda: aws_sdk_lambda::Client::new(&config),
        }
    }

    async fn physical_id(&self, stack: &str, logical_id: &str) -> AwsResult<String> {
        let output = self
            .cloudformation
            .describe_stack_resource()
            .stack_name(stack)
            .logical_resource_id(logical_id)
            .send()
            .await
            .map_err(|e| AwsError::Sdk {
                operation: "DescribeStackResource",
                target: format!("{stack}/{logical_id}"),
                message: CfnErrorContext(&e).to_string(),
            })?;

        output
            .stack_resource_detail()
            .and_then(|detail| detail.physical_resource_id())
            .map(str::to_string)
            .ok_or_else(|| AwsError::MissingResource {
                stack: stack.to_string(),
                logical_id: logical_id.to_string(),
            })
    }
}

#[async_trait]
impl FunctionResolver for AwsFunctionResolver {
    async fn resolve(&self, _key: &str, entry: &LambdaEntry) -> AwsResult<ResolvedFunction> {
        // Nested stacks are addressed by the physical id (ARN) of their parent's resource
        let mut stack = entry.root_stack_name.clone();
        for nested in &entry.nested_stack_logical_ids {
            stack = self.physical_id(&stack, nested).await?;
        }
        let function_name = self.physical_id(&stack, &entry.lambda_logical_id).await?;

        let function = self
            .lambda
            .get_function()
            .function_name(&function_name)
            .send()
            .await
            .map_err(|e| AwsError::Sdk {
                operation: "GetFunction",
                target: function_name.clone(),
                message: LambdaErrorContext(&e).to_string(),
            })?;

        let layers = function
            .configuration()
            .map(|config| {
                config
                    .layers()
                    .iter()
                    .filter_map(|layer| layer.arn())
                    .filter_map(layer_name_from_arn)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ResolvedFunction {
            function_name,
            layers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_names_come_from_arns() {
        assert_eq!(
            layer_name_from_arn("arn:aws:lambda:eu-west-1:123456789012:layer:3f9a1c:4"),
            Some("3f9a1c")
        );
        assert_eq!(layer_name_from_arn("arn:aws:lambda:eu-west-1:123:function:f"), None);
        assert_eq!(layer_name_from_arn("not-an-arn"), None);
    }

    #[test]
    fn stale_layer_is_reported_only_when_missing() {
        let entry: LambdaEntry = serde_json::from_value(serde_json::json!({
            "assetPath": "asset.1",
            "lambdaLogicalId": "Fn",
            "rootStackName": "Root",
            "nodeModulesLayerVersion": "abc123"
        }))
        .unwrap();

        let mut target = ResolvedTarget {
            key: "Root/Fn".to_string(),
            entry,
            function_name: "root-fn".to_string(),
            layers: vec!["other".to_string()],
        };
        assert_eq!(target.stale_layer(), Some("abc123"));

        target.layers.push("abc123".to_string());
        assert_eq!(target.stale_layer(), None);

        target.entry.node_modules_layer_version = None;
        target.layers.clear();
        assert_eq!(target.stale_layer(), None);
    }
}
