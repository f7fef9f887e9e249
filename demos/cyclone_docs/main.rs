//! # Cyclone Docs Example
//!
//! Ingests three sample plant documents (operations manual, maintenance
//! guide, safety procedures) and answers the questions operators ask most.
//!
//! Uses the deterministic `HashingEmbeddingProvider`, so it runs with no
//! model download and no API keys.
//!
//! Run: `cargo run --example cyclone_docs`
//!
//! Set `IDOCS_CONFIG=/path/to/config.json` to override pipeline parameters
//! and `RUST_LOG=idocs_rag=debug` to see retrieval logs.

use std::sync::Arc;

use idocs_rag::{Document, HashingEmbeddingProvider, RagConfig, RagPipeline};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Sample corpus
// ---------------------------------------------------------------------------

const OPERATIONS_MANUAL: &str = "\
CYCLONE SEPARATOR OPERATIONS

NORMAL OPERATING CONDITIONS
The cyclone separator should operate within the following parameters:
- Inlet gas temperature: 850-950°C
- Material outlet temperature: maximum 800°C
- Draft pressure: -150 to -200 mmH2O

STARTUP PROCEDURE
1. Verify all instrumentation is calibrated
2. Start combustion air fans
3. Gradually increase fuel flow
4. Monitor temperature rise carefully
5. Normal operating temperature should be reached within 2 hours

TROUBLESHOOTING
If inlet temperature drops suddenly:
- Check fuel supply system
- Verify combustion air flow
- Inspect burner condition

If draft pressure increases:
- Check for blockages in cyclone
- Inspect downstream equipment
- Verify fan operation
";

const MAINTENANCE_GUIDE: &str = "\
PREVENTIVE MAINTENANCE SCHEDULE

DAILY CHECKS
- Record temperature readings from all sensors
- Check pressure readings
- Visual inspection of equipment
- Verify alarm systems are operational

WEEKLY MAINTENANCE
- Calibrate temperature instruments
- Inspect refractory lining condition
- Check for unusual vibrations or noises
- Review alarm and trend data

MONTHLY MAINTENANCE
- Detailed internal inspection
- Analysis of performance trends
- Spare parts inventory check
- Update maintenance records

COMMON PROBLEMS
Temperature instability usually indicates fuel system issues.
Pressure variations often point to blockages or structural problems.
Always investigate gradual changes in performance, they often signal developing issues.
";

const SAFETY_PROCEDURES: &str = "\
SAFETY OPERATING PROCEDURES

PERSONAL PROTECTIVE EQUIPMENT
All personnel must wear:
- Heat resistant clothing
- Safety glasses
- Hard hat
- Steel-toed safety boots
- Hearing protection in high noise areas

EMERGENCY PROCEDURES
In case of equipment malfunction:
1. Activate emergency shutdown
2. Isolate fuel supply
3. Notify control room immediately
4. Evacuate area if necessary
5. Do not attempt repairs without proper authorization

TEMPERATURE SAFETY
- Inlet gas temperature alarm at 1000°C
- Material temperature warning at 850°C
- Emergency shutdown at 1100°C inlet temperature

DRAFT PRESSURE MONITORING
Normal operation: -150 to -200 mmH2O
Warning level: -250 mmH2O
Emergency shutdown: -300 mmH2O
";

fn sample_documents() -> Vec<Document> {
    let mut operations =
        Document::new("cyclone-ops", "Cyclone Operations Manual", OPERATIONS_MANUAL);
    operations.metadata.insert("category".into(), "operations".into());

    let mut maintenance = Document::new("maintenance", "Maintenance Guide", MAINTENANCE_GUIDE);
    maintenance.metadata.insert("category".into(), "maintenance".into());

    let mut safety = Document::new("safety", "Safety Procedures", SAFETY_PROCEDURES);
    safety.metadata.insert("category".into(), "safety".into());

    vec![operations, maintenance, safety]
}

fn load_config() -> anyhow::Result<RagConfig> {
    match std::env::var("IDOCS_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)?;
            let config = RagConfig::from_json(&json)?;
            info!(path = %path, "loaded config");
            Ok(config)
        }
        // Small chunks keep each section of the sample manuals separate.
        Err(_) => Ok(RagConfig::builder().chunk_size(48).chunk_overlap(8).build()?),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // -- 1. Build the pipeline --------------------------------------------
    let pipeline = Arc::new(
        RagPipeline::builder()
            .config(load_config()?)
            .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
            .build()?,
    );

    // -- 2. Ingest the sample corpus --------------------------------------
    let documents = sample_documents();
    println!("Ingesting {} documents...", documents.len());
    for doc in &documents {
        let chunks = pipeline.ingest(doc).await?;
        println!("  {} → {} chunk(s)", doc.title, chunks.len());
    }
    println!("Index holds {} chunks", pipeline.index().len());

    // -- 3. Ask operator questions ----------------------------------------
    let questions = [
        "What is the normal operating temperature?",
        "What should I do if the temperature drops suddenly?",
        "How often should I do maintenance?",
        "What safety equipment do I need?",
        "What is the draft pressure warning level?",
        "How do I bypass the temperature interlock?",
        "What is the recipe for chocolate cake?",
    ];

    // Questions run concurrently against the same index snapshot.
    let handles: Vec<_> = questions
        .into_iter()
        .map(|question| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { (question, pipeline.answer_query(question).await) })
        })
        .collect();

    for handle in handles {
        let (question, answer) = handle.await?;
        println!("\nQ: {question}");
        println!("[{:?}, confidence={:.2}]", answer.outcome, answer.confidence);
        println!("{}", answer.text);
    }

    Ok(())
}
