//! Ruleset load orchestration (C7): dispatches each `RulesetConfig` to the
//! fetcher with bounded concurrency, preserving input order in the result.

use super::{RulesetConfig, RulesetContent};
use crate::fetch::Fetcher;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

pub struct RulesetEngine {
    fetcher: Arc<Fetcher>,
    /// Bounded concurrency for ruleset fetches (`asyncFetchRuleset` switch
    /// in §4.7 maps onto "how many fetches may be in flight at once").
    concurrency: usize,
}

impl RulesetEngine {
    pub fn new(fetcher: Arc<Fetcher>, concurrency: usize) -> Self {
        RulesetEngine {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn load(&self, configs: &[RulesetConfig]) -> Vec<RulesetContent> {
        load_rulesets(&self.fetcher, configs, self.concurrency).await
    }
}

/// Fetches every ruleset in `configs`, preserving order, using at most
/// `concurrency` fetches in flight at once. Inline `[]rule` entries resolve
/// without touching the network.
pub async fn load_rulesets(
    fetcher: &Fetcher,
    configs: &[RulesetConfig],
    concurrency: usize,
) -> Vec<RulesetContent> {
    let indexed: Vec<(usize, &RulesetConfig)> = configs.iter().enumerate().collect();

    let results: Vec<(usize, RulesetContent)> = stream::iter(indexed)
        .map(|(idx, cfg)| async move {
            let mut content = RulesetContent::new(cfg.fetch_url(), cfg.group.clone(), cfg.ruleset_type());
            content.update_interval = cfg.interval;
            content.flags = cfg.flags.clone();

            if let Some(inline) = cfg.inline_rule() {
                content.set_rule_content(inline);
                return (idx, content);
            }

            match fetcher.fetch(cfg.fetch_url()).await {
                Ok(bytes) => {
                    content.set_rule_content(&String::from_utf8_lossy(&bytes));
                }
                Err(_) => {
                    // ParseFailure/FetchFailure policy: recover locally,
                    // leave the ruleset empty so emitters skip it.
                }
            }
            (idx, content)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut ordered: Vec<Option<RulesetContent>> = (0..configs.len()).map(|_| None).collect();
    for (idx, content) in results {
        ordered[idx] = Some(content);
    }
    ordered.into_iter().map(|c| c.unwrap()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::RulesetType;

    #[tokio::test]
    async fn inline_rules_resolve_without_network_and_preserve_order() {
        let fetcher = Fetcher::new_default();
        let configs = vec![
            RulesetConfig::new("A", "[]DOMAIN-SUFFIX,a.com"),
            RulesetConfig::new("B", "[]DOMAIN-SUFFIX,b.com"),
        ];
        let contents = load_rulesets(&fetcher, &configs, 4).await;
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].group, "A");
        assert_eq!(contents[0].raw(), "DOMAIN-SUFFIX,a.com");
        assert_eq!(contents[1].group, "B");
        assert_eq!(contents[0].ruleset_type, RulesetType::SurgeRuleset);
    }
}
