//! Provider selection: filter registered adapters against the request,
//! estimate each survivor, score, and explain the choice.
//!
//! Scoring weights are pinned per build and published here:
//! fee contributes up to 40 points (the cheapest candidate scores full and
//! the rest scale by cost ratio), latency up to 20 (same ratio scheme
//! against the fastest), anonymity-set size up to 20 (against the largest),
//! compliance support adds 10 when requested, and a preferred-provider
//! match adds 10. Ties break on alphabetical provider id.

use privacykit_types::{
    CostEstimate, EstimateRequest, OperationKind, PrivacyKitError, PrivacyKitResult,
    SelectionCriteria,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::provider::PrivacyProvider;

pub const WEIGHT_FEE: f64 = 40.0;
pub const WEIGHT_LATENCY: f64 = 20.0;
pub const WEIGHT_ANONYMITY: f64 = 20.0;
pub const WEIGHT_COMPLIANCE: i64 = 10;
pub const WEIGHT_PREFERRED: i64 = 10;

#[derive(Clone, Debug)]
pub struct RankedProvider {
    pub provider_id: String,
    pub score: i64,
    pub estimate: CostEstimate,
}

#[derive(Clone, Debug)]
pub struct SelectionResult {
    pub provider_id: String,
    pub score: i64,
    pub estimate: CostEstimate,
    /// Human-readable reasons the recommended provider matched.
    pub reasons: Vec<String>,
    /// Remaining candidates, best first.
    pub alternatives: Vec<RankedProvider>,
}

/// Routes declarative requests to the best registered adapter.
pub struct ProviderRouter {
    providers: BTreeMap<String, Arc<dyn PrivacyProvider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn PrivacyProvider>) {
        self.providers
            .insert(provider.provider_id().to_string(), provider);
    }

    pub fn provider(&self, provider_id: &str) -> Option<Arc<dyn PrivacyProvider>> {
        self.providers.get(provider_id).cloned()
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn select_provider(
        &self,
        criteria: &SelectionCriteria,
    ) -> PrivacyKitResult<SelectionResult> {
        let mut excluded: Vec<(String, String)> = Vec::new();
        let mut candidates: Vec<(String, Arc<dyn PrivacyProvider>, CostEstimate)> = Vec::new();

        for (id, provider) in &self.providers {
            if let Some(reason) = self.exclusion_reason(provider.as_ref(), criteria).await {
                debug!("router excluded {}: {}", id, reason);
                excluded.push((id.clone(), reason));
                continue;
            }

            let request = EstimateRequest {
                operation: OperationKind::Transfer,
                token: criteria.token.clone(),
                amount: criteria.amount,
                privacy_level: criteria.privacy_level,
            };
            let estimate = match provider.estimate(&request).await {
                Ok(estimate) => estimate,
                Err(e) => {
                    excluded.push((id.clone(), e.to_string()));
                    continue;
                }
            };

            if let Some(warning) = estimate.warnings.first() {
                excluded.push((id.clone(), warning.clone()));
                continue;
            }
            if let Some(max_fee) = criteria.max_fee {
                if estimate.fee > max_fee {
                    excluded.push((
                        id.clone(),
                        format!("estimated fee {} exceeds limit {}", estimate.fee, max_fee),
                    ));
                    continue;
                }
            }
            if let Some(max_latency) = criteria.max_latency_ms {
                if estimate.latency_ms > max_latency {
                    excluded.push((
                        id.clone(),
                        format!(
                            "estimated latency {} ms exceeds limit {} ms",
                            estimate.latency_ms, max_latency
                        ),
                    ));
                    continue;
                }
            }

            candidates.push((id.clone(), provider.clone(), estimate));
        }

        if candidates.is_empty() {
            let diagnostic = if excluded.is_empty() {
                "no providers registered".to_string()
            } else {
                excluded
                    .iter()
                    .map(|(id, reason)| format!("{}: {}", id, reason))
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(PrivacyKitError::NoSuitableProvider(diagnostic));
        }

        let cheapest = candidates
            .iter()
            .map(|(_, _, e)| e.fee)
            .fold(f64::INFINITY, f64::min);
        let fastest = candidates
            .iter()
            .map(|(_, _, e)| e.latency_ms)
            .min()
            .unwrap_or(0);
        let largest_set = candidates
            .iter()
            .filter_map(|(_, _, e)| e.anonymity_set)
            .max()
            .unwrap_or(0);

        let mut ranked: Vec<(RankedProvider, Arc<dyn PrivacyProvider>)> = candidates
            .into_iter()
            .map(|(id, provider, estimate)| {
                let score = score_candidate(
                    provider.as_ref(),
                    criteria,
                    &estimate,
                    cheapest,
                    fastest,
                    largest_set,
                );
                (
                    RankedProvider {
                        provider_id: id,
                        score,
                        estimate,
                    },
                    provider,
                )
            })
            .collect();

        // Stable sort preserves the BTreeMap's alphabetical order on ties
        ranked.sort_by(|a, b| b.0.score.cmp(&a.0.score));

        let (recommended, provider) = ranked.remove(0);
        let reasons = build_reasons(provider.as_ref(), criteria, &recommended.estimate);
        info!(
            "router selected {} (score {}) from {} candidates",
            recommended.provider_id,
            recommended.score,
            ranked.len() + 1
        );

        Ok(SelectionResult {
            provider_id: recommended.provider_id,
            score: recommended.score,
            estimate: recommended.estimate,
            reasons,
            alternatives: ranked.into_iter().map(|(r, _)| r).collect(),
        })
    }

    async fn exclusion_reason(
        &self,
        provider: &dyn PrivacyProvider,
        criteria: &SelectionCriteria,
    ) -> Option<String> {
        if !provider.is_ready().await {
            return Some("not initialized".to_string());
        }
        if !provider
            .supported_privacy_levels()
            .contains(&criteria.privacy_level)
        {
            return Some(format!(
                "does not support {} privacy",
                criteria.privacy_level
            ));
        }
        if !provider.supported_tokens().supports(&criteria.token) {
            return Some(format!("does not support {}", criteria.token));
        }
        if criteria.require_compliance && !provider.supports_compliance() {
            return Some("no selective disclosure support".to_string());
        }
        None
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn score_candidate(
    provider: &dyn PrivacyProvider,
    criteria: &SelectionCriteria,
    estimate: &CostEstimate,
    cheapest: f64,
    fastest: u64,
    largest_set: u64,
) -> i64 {
    let fee_score = if estimate.fee <= 0.0 || cheapest <= 0.0 {
        WEIGHT_FEE
    } else {
        WEIGHT_FEE * (cheapest / estimate.fee)
    };

    let latency_score = if estimate.latency_ms == 0 || fastest == 0 {
        WEIGHT_LATENCY
    } else {
        WEIGHT_LATENCY * (fastest as f64 / estimate.latency_ms as f64)
    };

    let anonymity_score = match (estimate.anonymity_set, largest_set) {
        (Some(set), largest) if largest > 0 => WEIGHT_ANONYMITY * (set as f64 / largest as f64),
        _ => 0.0,
    };

    let mut score = (fee_score + latency_score + anonymity_score).round() as i64;
    if criteria.require_compliance && provider.supports_compliance() {
        score += WEIGHT_COMPLIANCE;
    }
    if criteria.preferred_provider.as_deref() == Some(provider.provider_id()) {
        score += WEIGHT_PREFERRED;
    }
    score
}

fn build_reasons(
    provider: &dyn PrivacyProvider,
    criteria: &SelectionCriteria,
    estimate: &CostEstimate,
) -> Vec<String> {
    let mut reasons = vec![
        format!("supports {} privacy", criteria.privacy_level),
        format!("supports {}", criteria.token),
        format!("estimated fee {:.4} {}", estimate.fee, criteria.token),
        format!("estimated latency {} ms", estimate.latency_ms),
    ];
    if let Some(set) = estimate.anonymity_set {
        reasons.push(format!("anonymity set ~{}", set));
    }
    if criteria.require_compliance && provider.supports_compliance() {
        reasons.push("selective disclosure available".to_string());
    }
    if criteria.preferred_provider.as_deref() == Some(provider.provider_id()) {
        reasons.push("preferred provider".to_string());
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        ArciumAdapter, ArciumConfig, NoirAdapter, NoirConfig, PrivacyCashAdapter,
        PrivacyCashConfig, ShadowWireAdapter, ShadowWireConfig,
    };
    use crate::testing::{MockChain, MockWallet};
    use privacykit_types::PrivacyLevel;

    /// The four stock adapters, initialized against mocks. ShadowWire points
    /// at a closed port so its health probe fails fast.
    async fn full_router() -> ProviderRouter {
        let chain = Arc::new(MockChain::new());
        let wallet = Arc::new(MockWallet::new("alice"));

        let shadow_wire = ShadowWireAdapter::new(ShadowWireConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..ShadowWireConfig::default()
        })
        .unwrap();
        let arcium = ArciumAdapter::new(ArciumConfig::default());
        let noir = NoirAdapter::new(NoirConfig::default());
        let privacy_cash = PrivacyCashAdapter::new(PrivacyCashConfig::default()).unwrap();

        let mut router = ProviderRouter::new();
        for provider in [
            Arc::new(shadow_wire) as Arc<dyn PrivacyProvider>,
            Arc::new(arcium),
            Arc::new(noir),
            Arc::new(privacy_cash),
        ] {
            provider
                .initialize(chain.clone(), Some(wallet.clone()))
                .await
                .unwrap();
            router.register(provider);
        }
        router
    }

    #[tokio::test]
    async fn test_amount_hidden_usdc_prefers_arcium() {
        let router = full_router().await;
        let criteria = SelectionCriteria {
            max_fee: Some(2.0),
            ..SelectionCriteria::new(PrivacyLevel::AmountHidden, "USDC", 100.0)
        };

        let result = router.select_provider(&criteria).await.unwrap();
        // Arcium's 0.2 fee beats ShadowWire's 1.0; the shielded-only
        // adapters never reach scoring
        assert_eq!(result.provider_id, "arcium");
        assert_eq!(result.alternatives.len(), 1);
        assert_eq!(result.alternatives[0].provider_id, "shadowwire");
        assert!((result.estimate.fee - 0.2).abs() < 1e-9);

        assert!(result
            .reasons
            .iter()
            .any(|r| r.contains("amount-hidden")));
        assert!(result.reasons.iter().any(|r| r.contains("USDC")));
        assert!(result.reasons.iter().any(|r| r.contains("fee")));
        assert!(result.reasons.iter().any(|r| r.contains("latency")));
        assert!(result.reasons.iter().any(|r| r.contains("anonymity")));
    }

    #[tokio::test]
    async fn test_recommended_is_registered() {
        let router = full_router().await;
        let criteria = SelectionCriteria::new(PrivacyLevel::FullyShielded, "SOL", 5.0);

        let result = router.select_provider(&criteria).await.unwrap();
        assert!(router.provider_ids().contains(&result.provider_id));
    }

    #[tokio::test]
    async fn test_no_candidate_reports_every_exclusion() {
        let router = full_router().await;
        // Nobody supports transparent routing
        let criteria = SelectionCriteria::new(PrivacyLevel::Transparent, "USDC", 100.0);

        match router.select_provider(&criteria).await {
            Err(PrivacyKitError::NoSuitableProvider(diagnostic)) => {
                for id in ["arcium", "noir", "privacy-cash", "shadowwire"] {
                    assert!(diagnostic.contains(id), "missing {}: {}", id, diagnostic);
                }
            }
            other => panic!("expected NoSuitableProvider, got ok={}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_max_fee_excludes_candidates() {
        let router = full_router().await;
        let criteria = SelectionCriteria {
            max_fee: Some(0.5),
            ..SelectionCriteria::new(PrivacyLevel::AmountHidden, "USDC", 100.0)
        };

        // ShadowWire's fee of 1.0 breaks the cap; only Arcium survives
        let result = router.select_provider(&criteria).await.unwrap();
        assert_eq!(result.provider_id, "arcium");
        assert!(result.alternatives.is_empty());
    }

    #[tokio::test]
    async fn test_max_latency_excludes_candidates() {
        let router = full_router().await;
        let criteria = SelectionCriteria {
            max_latency_ms: Some(5_000),
            ..SelectionCriteria::new(PrivacyLevel::AmountHidden, "USDC", 100.0)
        };

        let result = router.select_provider(&criteria).await.unwrap();
        assert_eq!(result.provider_id, "shadowwire");
    }

    #[tokio::test]
    async fn test_compliance_requirement_filters() {
        let router = full_router().await;
        let criteria = SelectionCriteria {
            require_compliance: true,
            ..SelectionCriteria::new(PrivacyLevel::AmountHidden, "USDC", 100.0)
        };

        // Only ShadowWire offers selective disclosure
        let result = router.select_provider(&criteria).await.unwrap();
        assert_eq!(result.provider_id, "shadowwire");
        assert!(result
            .reasons
            .iter()
            .any(|r| r.contains("selective disclosure")));
    }

    #[tokio::test]
    async fn test_preferred_provider_bonus() {
        let router = full_router().await;
        // Shielded SOL: noir (anonymity 5000, latency 15s, fee 0.5%) vs
        // privacy-cash (anonymity 10000, latency 24s, fee 0.6% doubled).
        let neutral = router
            .select_provider(&SelectionCriteria::new(
                PrivacyLevel::FullyShielded,
                "SOL",
                5.0,
            ))
            .await
            .unwrap();

        let preferred_other = if neutral.provider_id == "noir" {
            "privacy-cash"
        } else {
            "noir"
        };
        let preferred = router
            .select_provider(&SelectionCriteria {
                preferred_provider: Some(preferred_other.to_string()),
                ..SelectionCriteria::new(PrivacyLevel::FullyShielded, "SOL", 5.0)
            })
            .await
            .unwrap();

        // The bonus shows up in the winner's or runner-up's score
        let bonus_score: i64 = if preferred.provider_id == preferred_other {
            preferred.score
        } else {
            preferred
                .alternatives
                .iter()
                .find(|a| a.provider_id == preferred_other)
                .unwrap()
                .score
        };
        let neutral_score: i64 = if neutral.provider_id == preferred_other {
            neutral.score
        } else {
            neutral
                .alternatives
                .iter()
                .find(|a| a.provider_id == preferred_other)
                .unwrap()
                .score
        };
        assert_eq!(bonus_score, neutral_score + WEIGHT_PREFERRED);
    }

    #[tokio::test]
    async fn test_below_minimum_amount_is_excluded_with_reason() {
        let router = full_router().await;
        let criteria = SelectionCriteria::new(PrivacyLevel::AmountHidden, "USDC", 0.5);

        match router.select_provider(&criteria).await {
            Err(PrivacyKitError::NoSuitableProvider(diagnostic)) => {
                assert!(diagnostic.contains("below"), "{}", diagnostic);
            }
            other => panic!("expected NoSuitableProvider, got ok={}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_empty_router() {
        let router = ProviderRouter::new();
        assert!(router.is_empty());

        let result = router
            .select_provider(&SelectionCriteria::new(
                PrivacyLevel::AmountHidden,
                "USDC",
                100.0,
            ))
            .await;
        assert!(matches!(
            result,
            Err(PrivacyKitError::NoSuitableProvider(_))
        ));
    }

    #[tokio::test]
    async fn test_uninitialized_adapter_is_excluded() {
        let mut router = ProviderRouter::new();
        router.register(Arc::new(ArciumAdapter::new(ArciumConfig::default())));

        match router
            .select_provider(&SelectionCriteria::new(
                PrivacyLevel::AmountHidden,
                "USDC",
                100.0,
            ))
            .await
        {
            Err(PrivacyKitError::NoSuitableProvider(diagnostic)) => {
                assert!(diagnostic.contains("not initialized"));
            }
            other => panic!("expected NoSuitableProvider, got ok={}", other.is_ok()),
        }
    }
}
