//! Integration tests for the template service facade and the production
//! render pipeline's pre-engine failure paths.

use std::collections::BTreeMap;

use chrono::Utc;
use reelsmith_core::template::{
    LayerKind, Resolution, Template, TemplateLayer, TemplateVariable, VariableConstraints,
    VariableType,
};
use reelsmith_core::types::new_entity_id;
use reelsmith_db::models::job::SubmitJob;
use reelsmith_db::repositories::JobRepo;
use reelsmith_db::{create_pool, DbPool, MIGRATOR};
use reelsmith_ffmpeg::encode::FfmpegRenderer;
use reelsmith_pipeline::{CompositorPipeline, ServiceError, TemplateService};
use reelsmith_scheduler::{ProgressSink, RenderPipeline};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn test_pool() -> DbPool {
    let pool = create_pool("sqlite::memory:")
        .await
        .expect("in-memory pool");
    MIGRATOR.run(&pool).await.expect("migrations");
    pool
}

fn image_layer(source: &str) -> TemplateLayer {
    TemplateLayer {
        id: new_entity_id(),
        kind: LayerKind::Image,
        name: "bg".to_string(),
        start_time: 0.0,
        duration: 10.0,
        z_index: 0,
        properties: serde_json::json!({"source": source})
            .as_object()
            .cloned()
            .unwrap(),
    }
}

fn template(name: &str) -> Template {
    let now = Utc::now();
    Template {
        id: new_entity_id(),
        name: name.to_string(),
        niche: "horror".to_string(),
        description: String::new(),
        duration_seconds: 10.0,
        resolution: Resolution {
            width: 1080,
            height: 1920,
        },
        framerate: 30,
        layers: vec![image_layer("${BG_IMAGE}")],
        variables: BTreeMap::from([(
            "BG_IMAGE".to_string(),
            TemplateVariable {
                name: "BG_IMAGE".to_string(),
                kind: VariableType::Image,
                required: false,
                default: Some(serde_json::json!("default-bg.png")),
                validation: None,
            },
        )]),
        metadata: serde_json::Map::new(),
        created_at: now,
        updated_at: now,
    }
}

fn values(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    v.as_object().cloned().unwrap_or_default()
}

fn noop_progress() -> ProgressSink {
    std::sync::Arc::new(|_, _| {})
}

// ---------------------------------------------------------------------------
// Template service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_get_round_trip() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool);

    let saved = service.save(template("Spooky")).await.unwrap();
    let fetched = service.get(&saved.id).await.unwrap();
    assert_eq!(fetched.name, "Spooky");
    assert!(fetched.updated_at >= fetched.created_at);
}

#[tokio::test]
async fn get_unknown_template_is_not_found() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool);
    let err = service.get(&"missing".to_string()).await.unwrap_err();
    assert!(matches!(err, ServiceError::TemplateNotFound(_)));
}

#[tokio::test]
async fn list_filters_by_niche() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool);

    service.save(template("A")).await.unwrap();
    let mut other = template("B");
    other.niche = "facts".to_string();
    service.save(other).await.unwrap();

    assert_eq!(service.list(Some("horror")).await.unwrap().len(), 1);
    assert_eq!(service.list(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn validate_reports_schema_violations() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool);

    let mut t = template("Strict");
    t.variables.insert(
        "X".to_string(),
        TemplateVariable {
            name: "X".to_string(),
            kind: VariableType::Number,
            required: true,
            default: None,
            validation: Some(VariableConstraints {
                min: Some(0.0),
                max: Some(10.0),
                ..Default::default()
            }),
        },
    );
    let t = service.save(t).await.unwrap();

    let report = service.validate(&t.id, &values(serde_json::json!({}))).await.unwrap();
    assert!(!report.is_valid());

    let report = service
        .validate(&t.id, &values(serde_json::json!({"X": 5})))
        .await
        .unwrap();
    assert!(report.is_valid());
}

#[tokio::test]
async fn resolve_substitutes_defaults_from_the_store() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool);
    let t = service.save(template("Spooky")).await.unwrap();

    let resolved = service.resolve(&t.id, &values(serde_json::json!({}))).await.unwrap();
    assert_eq!(
        resolved.layers[0].properties["source"],
        serde_json::json!("default-bg.png")
    );

    let resolved = service
        .resolve(&t.id, &values(serde_json::json!({"BG_IMAGE": "custom.png"})))
        .await
        .unwrap();
    assert_eq!(
        resolved.layers[0].properties["source"],
        serde_json::json!("custom.png")
    );
}

#[tokio::test]
async fn clone_copies_under_a_fresh_identity() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool);
    let original = service.save(template("Original")).await.unwrap();

    let copy = service.clone_template(&original.id, "Copy").await.unwrap();
    assert_ne!(copy.id, original.id);
    assert_eq!(copy.name, "Copy");

    // Both rows exist; the source is untouched.
    assert_eq!(service.list(None).await.unwrap().len(), 2);
    assert_eq!(service.get(&original.id).await.unwrap().name, "Original");
}

#[tokio::test]
async fn delete_removes_the_template() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool);
    let t = service.save(template("Gone")).await.unwrap();

    assert!(service.delete(&t.id).await.unwrap());
    assert!(matches!(
        service.get(&t.id).await.unwrap_err(),
        ServiceError::TemplateNotFound(_)
    ));
}

#[tokio::test]
async fn resolve_estimate_and_compose_end_to_end() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool);

    let mut t = template("Short");
    t.duration_seconds = 5.0;
    t.layers[0].duration = 5.0;
    t.layers.push(TemplateLayer {
        id: new_entity_id(),
        kind: LayerKind::Audio,
        name: "voice".to_string(),
        start_time: 0.0,
        duration: 5.0,
        z_index: 1,
        properties: serde_json::json!({"source": "voice.mp3", "volume": 0.5})
            .as_object()
            .cloned()
            .unwrap(),
    });
    let t = service.save(t).await.unwrap();

    let resolved = service.resolve(&t.id, &values(serde_json::json!({}))).await.unwrap();

    let estimate = reelsmith_ffmpeg::estimate_render_time(&resolved);
    assert_eq!(estimate.complexity.label(), "low");

    let graph = reelsmith_ffmpeg::compose::build_graph(&resolved).unwrap();
    assert_eq!(graph.file_input_count(), 2);
    let program = graph.filter_complex();
    assert!(program.contains("volume=0.5"));
    assert!(program.ends_with("[outa]"));
}

// ---------------------------------------------------------------------------
// Render pipeline failure paths (no engine binary involved)
// ---------------------------------------------------------------------------

async fn submitted_job(pool: &DbPool, template_id: &str, vars: serde_json::Value) -> reelsmith_db::models::job::Job {
    JobRepo::submit(
        pool,
        &SubmitJob {
            template_id: template_id.to_string(),
            variables: values(vars),
            output_path: "/tmp/out.mp4".to_string(),
            metadata: None,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn pipeline_fails_cleanly_on_unknown_template() {
    let pool = test_pool().await;
    let pipeline = CompositorPipeline::new(pool.clone(), FfmpegRenderer::new("ffmpeg"));

    let job = submitted_job(&pool, "missing", serde_json::json!({})).await;
    let err = pipeline.render(&job, noop_progress()).await.unwrap_err();
    assert!(err.to_string().contains("template not found"));
}

#[tokio::test]
async fn pipeline_surfaces_validation_errors() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool.clone());

    let mut t = template("Strict");
    t.variables.insert(
        "X".to_string(),
        TemplateVariable {
            name: "X".to_string(),
            kind: VariableType::Number,
            required: true,
            default: None,
            validation: None,
        },
    );
    let t = service.save(t).await.unwrap();

    let pipeline = CompositorPipeline::new(pool.clone(), FfmpegRenderer::new("ffmpeg"));
    let job = submitted_job(&pool, &t.id, serde_json::json!({})).await;
    let err = pipeline.render(&job, noop_progress()).await.unwrap_err();
    assert!(err.to_string().contains("Validation failed"));
}

#[tokio::test]
async fn pipeline_rejects_templates_without_visual_content() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool.clone());

    let mut t = template("Empty");
    t.layers.clear();
    t.variables.clear();
    let t = service.save(t).await.unwrap();

    let pipeline = CompositorPipeline::new(pool.clone(), FfmpegRenderer::new("ffmpeg"));
    let job = submitted_job(&pool, &t.id, serde_json::json!({})).await;
    let err = pipeline.render(&job, noop_progress()).await.unwrap_err();
    assert!(err.to_string().contains("no visual layers"));
}

#[tokio::test]
async fn pipeline_records_the_estimate_before_encoding() {
    let pool = test_pool().await;
    let service = TemplateService::new(pool.clone());
    let t = service.save(template("Spooky")).await.unwrap();

    // A renderer pointing at a missing binary: the estimate is stored even
    // though the encode step then fails to spawn.
    let pipeline = CompositorPipeline::new(
        pool.clone(),
        FfmpegRenderer::new("reelsmith-test-missing-binary"),
    );
    let job = submitted_job(&pool, &t.id, serde_json::json!({})).await;
    let err = pipeline.render(&job, noop_progress()).await.unwrap_err();
    assert!(err.to_string().contains("could not be spawned"));

    let stored = JobRepo::find_by_id(&pool, &job.id).await.unwrap().unwrap();
    assert!(stored.estimated_duration_seconds.unwrap() > 0);
}
