//! Boundary behaviors from spec §8: an empty module registry must
//! complete immediately with an empty-but-valid unified document, with
//! no error and no module-result rows at all.

use trialforge_cache::Cache;
use trialforge_config::{Config, ModuleRegistry};
use trialforge_engine::ModuleOrchestrator;
use trialforge_llm::StubBackend;
use trialforge_store::types::JobKind;
use trialforge_store::{module_results, protocols, schema};

#[tokio::test]
async fn empty_module_registry_completes_immediately_with_an_empty_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.module_registry = ModuleRegistry { modules: vec![] };

    // A backend that errors on any call proves no module extraction
    // is ever attempted for an empty registry.
    let backend = StubBackend::always_returning(String::new());

    let mut conn = schema::open(":memory:").unwrap();
    let proto = protocols::get_or_create(&conn, "empty.pdf", "h-empty", 0).unwrap();
    let job = trialforge_store::jobs::create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();
    let cache = Cache::open(":memory:", dir.path().join("file_cache")).unwrap();

    let orchestrator = ModuleOrchestrator::new(&backend, &config);
    let outcome = orchestrator
        .run(&mut conn, &cache, &job.id, &proto.id, "empty.pdf", b"", &[], false)
        .await
        .unwrap();

    assert_eq!(outcome.final_status, "completed");
    assert!(outcome.unified_document.study.is_none());
    assert!(outcome.unified_document.domain_sections.is_empty());
    assert!(backend.calls().is_empty(), "an empty registry must never call the backend");

    let results = module_results::list_for_job(&conn, &job.id).unwrap();
    assert!(results.is_empty());

    let stored = trialforge_store::jobs::get(&conn, &job.id).unwrap();
    assert_eq!(stored.status, "completed");
}
