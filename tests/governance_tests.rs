//! Governance Pipeline Tests
//!
//! End-to-end request flows: admission, caching, budget enforcement,
//! retries, cancellation and configuration loading.
//!
//! Run: cargo nextest run --test governance_tests

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use support_governance::prelude::*;
use support_governance::{RateLimitConfig, RetryConfig};
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn governance_with(config: GovernanceConfig) -> (Governance<String>, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::starting_now());
    let governance = Governance::with_clock(&config, clock.clone());
    (governance, clock)
}

fn answer(
    text: &str,
    units: u64,
) -> std::result::Result<Generation<String>, Failure<UpstreamError>> {
    Ok(Generation::new(text.to_string(), units))
}

// =============================================================================
// Admission
// =============================================================================

mod admission_tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_past_burst_without_calling_upstream() {
        let config = GovernanceConfig {
            rate_limit: RateLimitConfig::new(1.0, 2),
            ..Default::default()
        };
        let (gov, _clock) = governance_with(config);
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        for i in 0..3 {
            let request = GovernedRequest::new("acme", "en", format!("question {i}"));
            let result = gov
                .run(&request, &cancel, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { answer("ok", 1) }
                })
                .await;

            if i < 2 {
                assert!(result.is_ok());
            } else {
                let err = result.unwrap_err();
                assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
                assert_eq!(err.status_code(), 429);
                assert_eq!(err.tenant_id(), Some("acme"));
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(gov.metrics().summary().rate_limited, 1);
    }

    #[tokio::test]
    async fn test_tenants_have_separate_buckets() {
        let config = GovernanceConfig {
            rate_limit: RateLimitConfig::new(1.0, 1),
            ..Default::default()
        };
        let (gov, _clock) = governance_with(config);
        let cancel = CancellationToken::new();

        let acme = GovernedRequest::new("acme", "en", "hi");
        let globex = GovernedRequest::new("globex", "en", "hi");

        assert!(gov.run(&acme, &cancel, || async { answer("a", 1) }).await.is_ok());
        assert!(gov.run(&globex, &cancel, || async { answer("g", 1) }).await.is_ok());
        assert!(gov.run(&acme, &cancel, || async { answer("a", 1) }).await.is_err());
    }

    #[tokio::test]
    async fn test_blank_tenants_share_the_unknown_bucket() {
        let config = GovernanceConfig {
            rate_limit: RateLimitConfig::new(1.0, 1),
            ..Default::default()
        };
        let (gov, _clock) = governance_with(config);
        let cancel = CancellationToken::new();

        let first = GovernedRequest::new("", "en", "one");
        let second = GovernedRequest::new("   ", "en", "two");

        assert!(gov.run(&first, &cancel, || async { answer("x", 1) }).await.is_ok());
        let err = gov
            .run(&second, &cancel, || async { answer("y", 1) })
            .await
            .unwrap_err();
        assert_eq!(err.tenant_id(), Some(support_governance::UNKNOWN_TENANT));
    }

    #[tokio::test]
    async fn test_bucket_refills_as_clock_advances() {
        let config = GovernanceConfig {
            rate_limit: RateLimitConfig::new(2.0, 1),
            ..Default::default()
        };
        let (gov, clock) = governance_with(config);
        let cancel = CancellationToken::new();
        let request = GovernedRequest::new("acme", "en", "refill");

        assert!(gov.limiter().allow("acme"));
        assert!(gov.run(&request, &cancel, || async { answer("x", 1) }).await.is_err());

        clock.advance(Duration::from_millis(500));
        assert!(gov.run(&request, &cancel, || async { answer("x", 1) }).await.is_ok());
    }
}

// =============================================================================
// Caching
// =============================================================================

mod cache_tests {
    use super::*;

    #[tokio::test]
    async fn test_equivalent_queries_hit_the_cache() {
        let (gov, _clock) = governance_with(GovernanceConfig::default());
        let cancel = CancellationToken::new();

        let first = GovernedRequest::new("acme", "EN", "  Where is   my order? ");
        let second = GovernedRequest::new("acme", "en", "where is my order?");

        let generated = gov
            .run(&first, &cancel, || async { answer("Tomorrow.", 30) })
            .await
            .unwrap();
        assert_eq!(generated.source, ResponseSource::Generated);

        let cached = gov
            .run(&second, &cancel, || async {
                Err(Failure::Fatal(UpstreamError::network("unreachable")))
            })
            .await
            .unwrap();
        assert_eq!(cached.source, ResponseSource::Cached);
        assert_eq!(cached.value, "Tomorrow.");
        assert!(cached.usage.is_none());

        let summary = gov.metrics().summary();
        assert_eq!(summary.cache_hits, 1);
        assert_eq!(summary.cache_misses, 1);
        assert_eq!(summary.upstream_calls, 1);
    }

    #[tokio::test]
    async fn test_cache_is_scoped_per_tenant() {
        let (gov, _clock) = governance_with(GovernanceConfig::default());
        let cancel = CancellationToken::new();

        gov.run(
            &GovernedRequest::new("acme", "en", "pricing"),
            &cancel,
            || async { answer("acme pricing", 5) },
        )
        .await
        .unwrap();

        let other = gov
            .run(
                &GovernedRequest::new("globex", "en", "pricing"),
                &cancel,
                || async { answer("globex pricing", 5) },
            )
            .await
            .unwrap();

        assert_eq!(other.source, ResponseSource::Generated);
        assert_eq!(other.value, "globex pricing");
    }

    #[tokio::test]
    async fn test_expired_entry_is_regenerated() {
        let (gov, clock) = governance_with(GovernanceConfig::default());
        let cancel = CancellationToken::new();
        let request = GovernedRequest::new("acme", "en", "returns policy");

        gov.run(&request, &cancel, || async { answer("30 days", 10) })
            .await
            .unwrap();

        clock.advance(Duration::from_secs(300));
        let refreshed = gov
            .run(&request, &cancel, || async { answer("60 days", 10) })
            .await
            .unwrap();

        assert_eq!(refreshed.source, ResponseSource::Generated);
        assert_eq!(refreshed.value, "60 days");
        assert_eq!(refreshed.usage.map(|u| u.units_consumed), Some(20));
    }
}

// =============================================================================
// Budget
// =============================================================================

mod budget_tests {
    use super::*;
    use support_governance::BudgetConfig;

    fn budgeted(quota: u64) -> GovernanceConfig {
        GovernanceConfig {
            budget: BudgetConfig::new(quota),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_budget_is_soft_then_rejects() {
        let (gov, _clock) = governance_with(budgeted(100));
        let cancel = CancellationToken::new();

        let served = gov
            .run(
                &GovernedRequest::new("acme", "en", "long answer"),
                &cancel,
                || async { answer("very long", 150) },
            )
            .await
            .unwrap();
        assert_eq!(served.usage.as_ref().map(|u| u.units_consumed), Some(150));

        let err = gov
            .run(
                &GovernedRequest::new("acme", "en", "another"),
                &cancel,
                || async { answer("nope", 1) },
            )
            .await
            .unwrap_err();

        match &err {
            Error::BudgetExceeded {
                tenant_id,
                remaining,
                resets_at,
            } => {
                assert_eq!(tenant_id, "acme");
                assert_eq!(*remaining, 0);
                let window = served.usage.as_ref().unwrap();
                assert_eq!(*resets_at, Some(window.resets_at()));
            }
            other => panic!("Expected BudgetExceeded, got {other:?}"),
        }
        assert_eq!(err.status_code(), 429);
        assert!(gov.budget().status("acme").is_exceeded());
    }

    #[tokio::test]
    async fn test_cache_hits_bypass_an_exhausted_budget() {
        let (gov, _clock) = governance_with(budgeted(10));
        let cancel = CancellationToken::new();
        let request = GovernedRequest::new("acme", "en", "faq");

        gov.run(&request, &cancel, || async { answer("answer", 10) })
            .await
            .unwrap();
        assert!(!gov.budget().allow("acme"));

        let cached = gov
            .run(&request, &cancel, || async { answer("unused", 1) })
            .await
            .unwrap();
        assert!(cached.is_cached());
    }

    #[tokio::test]
    async fn test_budget_recovers_after_window_rolls_over() {
        let (gov, clock) = governance_with(budgeted(10));
        let cancel = CancellationToken::new();

        gov.run(
            &GovernedRequest::new("acme", "en", "first"),
            &cancel,
            || async { answer("a", 10) },
        )
        .await
        .unwrap();
        assert!(!gov.budget().allow("acme"));

        clock.advance(Duration::from_secs(24 * 3600));
        let served = gov
            .run(
                &GovernedRequest::new("acme", "en", "second"),
                &cancel,
                || async { answer("b", 4) },
            )
            .await
            .unwrap();

        let usage = served.usage.unwrap();
        assert_eq!(usage.units_consumed, 4);
        assert_eq!(usage.request_count, 1);
        assert_eq!(gov.budget().remaining("acme").remaining, 6);
    }

    #[tokio::test]
    async fn test_zero_quota_disables_the_guard() {
        let (gov, _clock) = governance_with(GovernanceConfig::default());
        let cancel = CancellationToken::new();

        for i in 0..3 {
            gov.run(
                &GovernedRequest::new("acme", "en", format!("q{i}")),
                &cancel,
                || async { answer("x", 1_000_000) },
            )
            .await
            .unwrap();
        }

        let remaining = gov.budget().remaining("acme");
        assert!(!remaining.enabled);
        assert_eq!(remaining.remaining, 0);
        assert_eq!(gov.metrics().summary().budget_rejected, 0);
    }
}

// =============================================================================
// Retries and cancellation
// =============================================================================

mod resilience_tests {
    use super::*;

    fn fast_retries(max_retries: u32) -> GovernanceConfig {
        GovernanceConfig {
            retry: RetryConfig {
                max_retries,
                initial_delay_ms: 10,
                max_delay_ms: 40,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let (gov, _clock) = governance_with(fast_retries(3));
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let served = gov
            .run(&GovernedRequest::new("acme", "en", "flaky"), &cancel, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(UpstreamError::status(503, "overloaded").classify())
                    } else {
                        answer("finally", 7)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(served.value, "finally");
        assert_eq!(served.usage.map(|u| u.request_count), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_record_no_usage() {
        let (gov, _clock) = governance_with(fast_retries(2));
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let err = gov
            .run(&GovernedRequest::new("acme", "en", "down"), &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::timeout("no response").classify()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match &err {
            Error::RetriesExhausted { attempts, last } => {
                assert_eq!(*attempts, 3);
                assert_eq!(last.kind, UpstreamErrorKind::Timeout);
            }
            other => panic!("Expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(err.status_code(), 503);
        assert!(gov.usage().get("acme").is_none());
        assert!(gov.cache().is_empty());

        let summary = gov.metrics().summary();
        assert_eq!(summary.upstream_failures, 1);
        assert_eq!(summary.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let (gov, _clock) = governance_with(fast_retries(3));
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let err = gov
            .run(&GovernedRequest::new("acme", "en", "bad"), &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::status(400, "bad request").classify()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.code(), "UPSTREAM_FAILED");
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff() {
        let config = GovernanceConfig {
            retry: RetryConfig {
                max_retries: 5,
                initial_delay_ms: 30_000,
                max_delay_ms: 30_000,
                ..Default::default()
            },
            ..Default::default()
        };
        let (gov, _clock) = governance_with(config);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = gov
            .run(&GovernedRequest::new("acme", "en", "slow"), &cancel, || async {
                Err(UpstreamError::network("connection reset").classify())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(err.code(), "REQUEST_CANCELLED");
        assert!(gov.usage().get("acme").is_none());
        assert_eq!(gov.metrics().summary().cancelled, 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_upstream() {
        let (gov, _clock) = governance_with(GovernanceConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let err = gov
            .run(&GovernedRequest::new("acme", "en", "late"), &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { answer("never", 1) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(gov.usage().get("acme").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_while_upstream_is_running() {
        let (gov, _clock) = governance_with(GovernanceConfig::default());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = gov
            .run(&GovernedRequest::new("acme", "en", "slow answer"), &cancel, || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                answer("too late", 500)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(gov.usage().get("acme").is_none());
        assert!(gov.cache().is_empty());

        let summary = gov.metrics().summary();
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_request_releases_in_flight() {
        let (gov, _clock) = governance_with(GovernanceConfig::default());
        let cancel = CancellationToken::new();
        let request = GovernedRequest::new("acme", "en", "abandoned");

        let outcome = tokio::time::timeout(
            Duration::from_millis(10),
            gov.run(&request, &cancel, || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                answer("never delivered", 500)
            }),
        )
        .await;
        assert!(outcome.is_err());

        let summary = gov.metrics().summary();
        assert_eq!(summary.in_flight, 0);
        assert_eq!(summary.upstream_calls, 1);
        assert_eq!(summary.cancelled, 1);
        assert!(gov.usage().get("acme").is_none());
        assert!(gov.cache().is_empty());
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config_tests {
    use super::*;
    use support_governance::config::{MemoryConfigProvider, keys};
    use tempfile::tempdir;

    #[test]
    fn test_config_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("governance.json");
        std::fs::write(
            &path,
            r#"{
                "rate_limit": {"rate_per_sec": 1.5, "burst": 3},
                "cache": {"ttl_secs": 60},
                "budget": {"quota": 2500},
                "retry": {"max_retries": 1}
            }"#,
        )
        .unwrap();

        let config = GovernanceConfig::from_file(&path).unwrap();
        assert_eq!(config.rate_limit, RateLimitConfig::new(1.5, 3));
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.budget.quota, 2500);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.usage.window, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let err: Error = GovernanceConfig::from_file(dir.path().join("absent.json"))
            .unwrap_err()
            .into();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_provider_values_drive_components() {
        let provider = MemoryConfigProvider::new()
            .value(keys::RATE_LIMIT_BURST, "1")
            .value(keys::CACHE_TTL_SECONDS, "5")
            .value(keys::TOKEN_BUDGET, "50");
        let config = GovernanceConfig::from_provider(&provider).unwrap();
        let gov: Governance<String> = Governance::new(&config);

        assert_eq!(gov.limiter().config().burst, 1);
        assert_eq!(gov.cache().ttl(), Duration::from_secs(5));
        assert_eq!(gov.budget().quota(), 50);
        assert!(gov.budget().enabled());
    }
}
