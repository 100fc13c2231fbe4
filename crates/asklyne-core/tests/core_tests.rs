use std::collections::HashSet;

use asklyne_core::config::{expand_path, resolve_with_base, Config};
use asklyne_core::policy::{TierLimits, TierPolicy};
use asklyne_core::tokens::estimate_tokens;
use asklyne_core::types::{ChunkPayload, FusionRule, KeywordDocument, SearchFilter};
use asklyne_core::{Error, Mode, Session, Tier};
use figment::providers::{Format, Toml};
use figment::{Figment, Jail};

#[test]
fn token_estimate_is_quarter_of_characters_with_floor_of_one() {
    assert_eq!(estimate_tokens(""), 1);
    assert_eq!(estimate_tokens("abc"), 1);
    assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    assert_eq!(estimate_tokens(&"x".repeat(403)), 100);
    // Counted in characters, not bytes.
    assert_eq!(estimate_tokens(&"é".repeat(8)), 2);
}

#[test]
fn tier_and_mode_names_parse_into_closed_sets() {
    assert_eq!("Plus".parse::<Tier>().unwrap(), Tier::Plus);
    assert_eq!("notes".parse::<Mode>().unwrap(), Mode::Text);
    assert!(matches!("gold".parse::<Tier>(), Err(Error::InvalidConfig(_))));
    assert!(matches!("video".parse::<Mode>(), Err(Error::InvalidConfig(_))));
    assert!(Tier::Free < Tier::Plus && Tier::Plus < Tier::Pro);
}

#[test]
fn sessions_must_be_supplied() {
    assert!(matches!(Session::new("  "), Err(Error::InvalidInput(_))));
    assert_eq!(Session::new("abc-123").unwrap().as_str(), "abc-123");
}

#[test]
fn standard_policy_gates_rerank_by_tier() {
    let policy = TierPolicy::standard();
    for mode in Mode::ALL {
        assert!(!policy.resolve(Tier::Free, mode).rerank_enabled);
        assert!(policy.resolve(Tier::Plus, mode).rerank_enabled);
        assert!(policy.resolve(Tier::Pro, mode).rerank_enabled);
    }
    let free = policy.resolve(Tier::Free, Mode::Text);
    assert_eq!((free.token_limit, free.exchange_limit, free.file_size_limit_mb), (1000, 30, 5));
    assert_eq!(free.context_budget(), 900);
    assert_eq!(policy.resolve(Tier::Pro, Mode::Text).context_budget(), 7200);
}

#[test]
fn modes_select_distinct_embedding_spaces_and_collections() {
    let policy = TierPolicy::standard();
    let names: HashSet<String> = policy.profiles().map(|p| p.collection_name()).collect();
    assert_eq!(names.len(), 6);
    for tier in Tier::ALL {
        let text = policy.resolve(tier, Mode::Text);
        let code = policy.resolve(tier, Mode::Code);
        assert_ne!(text.embedding_model_id, code.embedding_model_id);
        assert_eq!(text.collection_name(), format!("asklyne_chunks_{}_text", tier));
    }
    assert_eq!(policy.resolve(Tier::Free, Mode::Text).vector_dimension, 384);
}

#[test]
fn resolve_named_fails_fast_on_unknown_pairs() {
    let policy = TierPolicy::standard();
    assert!(matches!(policy.resolve_named("enterprise", "text"), Err(Error::InvalidConfig(_))));
    assert!(matches!(policy.resolve_named("pro", "audio"), Err(Error::InvalidConfig(_))));
    assert_eq!(policy.resolve_named("PRO", "code").unwrap().mode, Mode::Code);
}

#[test]
fn incomplete_or_invalid_tables_are_rejected() {
    let mut profiles: Vec<_> = TierPolicy::standard().profiles().cloned().collect();
    let dropped = profiles.pop().unwrap();
    assert!(matches!(TierPolicy::from_profiles(profiles.clone()), Err(Error::InvalidConfig(_))));

    profiles.push(dropped.clone());
    profiles.push(dropped);
    assert!(matches!(TierPolicy::from_profiles(profiles.clone()), Err(Error::InvalidConfig(_))));

    profiles.pop();
    profiles[0].vector_dimension = 0;
    assert!(matches!(TierPolicy::from_profiles(profiles), Err(Error::InvalidConfig(_))));
}

#[test]
fn limit_overrides_apply_to_both_modes() {
    let limits = TierLimits { token_limit: Some(1500), exchange_limit: None, file_size_limit_mb: Some(7) };
    let policy = TierPolicy::standard().with_limits(Tier::Free, &limits).unwrap();
    for mode in Mode::ALL {
        let p = policy.resolve(Tier::Free, mode);
        assert_eq!((p.token_limit, p.exchange_limit, p.file_size_limit_mb), (1500, 30, 7));
    }
    assert_eq!(policy.resolve(Tier::Plus, Mode::Text).token_limit, 3000);
    let zero = TierLimits { token_limit: Some(0), ..TierLimits::default() };
    assert!(TierPolicy::standard().with_limits(Tier::Pro, &zero).is_err());
}

#[test]
fn filter_renders_session_and_mode_keys() {
    let session = Session::new("s1").unwrap();
    let filter = SearchFilter::new(&session, Mode::Code);
    let map = filter.to_map();
    assert_eq!(map.len(), 2);
    assert_eq!(map["session_id"], "s1");
    assert_eq!(map["mode"], "code");
    let payload = ChunkPayload { session_id: "s1".into(), tier: Tier::Pro, mode: Mode::Code, text: "fn main() {}".into() };
    assert!(filter.matches(&payload));
    assert!(!SearchFilter::new(&session, Mode::Text).matches(&payload));
}

#[test]
fn keyword_document_serializes_flat_payload() {
    let doc = KeywordDocument {
        id: "s1:text:abc".into(),
        payload: ChunkPayload { session_id: "s1".into(), tier: Tier::Free, mode: Mode::Text, text: "hello".into() },
    };
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["session_id"], "s1");
    assert_eq!(json["tier"], "free");
    assert_eq!(json["mode"], "text");
    assert_eq!(json["text"], "hello");
}

#[test]
fn settings_default_without_any_sources() {
    let settings = Config::from_figment(Figment::new()).settings().unwrap();
    assert_eq!(settings.retrieval.top_k, 5);
    assert_eq!(settings.retrieval.fusion, FusionRule::LastWriteWins);
    assert_eq!(settings.chunking.max_tokens, 256);
    assert_eq!(settings.chunking.overlap_tokens, 50);
    assert_eq!(settings.completion.max_tokens, 512);
    assert_eq!(settings.tier_policy().unwrap(), TierPolicy::standard());
}

#[test]
fn settings_read_toml_sections() {
    let toml = r#"
        [retrieval]
        top_k = 8
        fusion = "max_score"

        [tiers.plus]
        token_limit = 4000
    "#;
    let config = Config::from_figment(Figment::new().merge(Toml::string(toml)));
    let settings = config.settings().unwrap();
    assert_eq!(settings.retrieval.top_k, 8);
    assert_eq!(settings.retrieval.fusion, FusionRule::MaxScore);
    assert_eq!(settings.tier_policy().unwrap().resolve(Tier::Plus, Mode::Code).token_limit, 4000);
    assert_eq!(config.get::<usize>("retrieval.top_k").unwrap(), 8);
}

#[test]
fn invalid_settings_are_config_errors() {
    let config = Config::from_figment(Figment::new().merge(Toml::string("[retrieval]\ntop_k = 0\n")));
    assert!(matches!(config.settings(), Err(Error::InvalidConfig(_))));
}

#[test]
fn load_merges_env_file_and_prefixed_variables() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[data]\ntantivy_dir = \"idx/text\"\n[chunking]\nmax_tokens = 128\n")?;
        jail.create_file("config.test.toml", "[chunking]\noverlap_tokens = 16\n")?;
        jail.set_env("RUST_ENV", "test");
        jail.set_env("ASKLYNE_TIERS__FREE__TOKEN_LIMIT", "1200");

        let config = Config::load().map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.data.tantivy_dir, "idx/text");
        assert_eq!(settings.chunking.max_tokens, 128);
        assert_eq!(settings.chunking.overlap_tokens, 16);
        let policy = settings.tier_policy().map_err(|e| e.to_string())?;
        assert_eq!(policy.resolve(Tier::Free, Mode::Text).token_limit, 1200);
        Ok(())
    });
}

#[test]
fn paths_resolve_against_base() {
    let base = std::path::Path::new("/srv/asklyne");
    assert_eq!(resolve_with_base(base, "indexes/t"), base.join("indexes/t"));
    assert_eq!(resolve_with_base(base, "/abs/dir"), std::path::PathBuf::from("/abs/dir"));
    assert_eq!(expand_path("plain/dir"), std::path::PathBuf::from("plain/dir"));
}
