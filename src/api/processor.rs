use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use crate::api::models::{EngineStatus, EngineSummary, RequestContext, RequestReport, ValueReport};
use crate::data_classifier::{Classification, ClassificationResult};
use crate::engine::protocol::{pair_outputs, AnonymizedCell};
use crate::engine::{AnonymizationJob, TaggedValue, PROTOCOL_VERSION};
use crate::error::{PipelineError, Result};
use crate::level::{Level, SensitivityLevel};
use crate::sensitivity::LabelQuery;
use crate::services::Services;
use crate::source::{AttributeValue, RowSet, SourceMetadata};

/// Values classified at the same time within one request
const CLASSIFY_CONCURRENCY: usize = 8;

/// Domain and owner classification of one value
struct ClassifiedValue {
    domain: ClassificationResult,
    owner: Classification,
}

/// Runs one request through the whole pipeline.
///
/// Steps run strictly in order:
/// 1. Gather distinct values of the selected attributes
/// 2. Classify each value and score the requester
/// 3. Resolve per-value and overall sensitivity
/// 4. Serialize, invoke the engine, parse and collect its results
///
/// Classification and trust failures fall back to documented defaults and
/// are reported as warnings. Engine failures are reported in the engine
/// section rather than as an error. Only an unreadable source or a failure
/// to create the job files ends the request with an error.
#[instrument(
    skip(request, services),
    fields(request_id = tracing::field::Empty, source = %request.source_identifier, requester = %request.requester_email)
)]
pub async fn process_request(request: RequestContext, services: &Services) -> Result<RequestReport> {
    let request_id = Uuid::new_v4().to_string();
    Span::current().record("request_id", request_id.as_str());
    info!("Processing request for {} attributes", request.selected_attributes.len());
    let mut warnings = Vec::new();

    // Step 1: Gather
    let values = gather_values(&request, services, &mut warnings).await?;
    let metadata = services.metadata.lookup(&request.source_identifier);
    if metadata.is_none() {
        warn!("No metadata registered for source {}", request.source_identifier);
        warnings.push(format!(
            "no metadata registered for source '{}'",
            request.source_identifier
        ));
    }
    debug!("Gathered {} distinct values", values.len());

    // Step 2: Classify and score
    let (trust_score, trust_warning) = services.trust.predict_or_default(
        &request.requester_email,
        &request.requested_domain,
        &request.purpose,
    );
    warnings.extend(trust_warning);

    let classified = classify_values(values, services, &mut warnings).await;

    // Step 3: Resolve
    let sensitivities: Vec<SensitivityLevel> = classified
        .iter()
        .map(|c| resolve_value(c, metadata.as_ref(), services))
        .collect();
    let overall_sensitivity = Level::aggregate(sensitivities.iter().copied());
    info!("Trust score {}, overall sensitivity {}", trust_score, overall_sensitivity);

    // Step 4: Serialize, invoke, parse, collect, clean up
    let tagged: Vec<TaggedValue> = classified
        .iter()
        .map(|c| TaggedValue::from(&c.domain.value))
        .collect();
    let (cells, engine) = if tagged.is_empty() {
        info!("No values gathered, engine not invoked");
        (Vec::new(), EngineSummary::skipped())
    } else {
        let job = AnonymizationJob::create(
            &services.engine.work_dir(),
            request.requester_email.trim(),
            tagged.clone(),
            trust_score,
            overall_sensitivity,
        )?;
        invoke_engine(job, &tagged, services, &mut warnings).await
    };

    let values = classified
        .into_iter()
        .zip(sensitivities)
        .enumerate()
        .map(|(i, (c, sensitivity))| ValueReport {
            attribute: c.domain.value.attribute_name,
            value: c.domain.value.raw_value,
            domain_label: c.domain.matched_label,
            domain_neighbors: c.domain.neighbor_labels,
            owner_label: c.owner.label,
            owner_neighbors: c.owner.neighbor_labels,
            sensitivity,
            anonymized: cells.get(i).cloned(),
        })
        .collect();

    let source_metadata = metadata.unwrap_or_else(SourceMetadata::not_found);
    let compliance = services
        .policy
        .compliance(&source_metadata.domain, &source_metadata.about);

    Ok(RequestReport {
        request_id,
        requester_email: request.requester_email,
        source: request.source_identifier,
        source_metadata,
        compliance,
        trust_score,
        overall_sensitivity,
        values,
        engine,
        warnings,
    })
}

/// Distinct non-null values of every selected attribute, in selection order.
/// Attributes the source does not have are skipped with a warning.
///
/// Reading and de-duplication both run on the blocking pool.
async fn gather_values(
    request: &RequestContext,
    services: &Services,
    warnings: &mut Vec<String>,
) -> Result<Vec<AttributeValue>> {
    let source = services.data_source.clone();
    let name = request.source_identifier.clone();
    let attributes = request.selected_attributes.clone();
    let span = Span::current();

    let (values, notes) = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let rows = source.load_rows(&name)?;
        Ok::<_, PipelineError>(distinct_attribute_values(&rows, &attributes, &name))
    })
    .await
    .map_err(|e| PipelineError::SourceUnavailable(format!("source reader failed: {}", e)))??;

    warnings.extend(notes);
    Ok(values)
}

fn distinct_attribute_values(
    rows: &RowSet,
    attributes: &[String],
    source: &str,
) -> (Vec<AttributeValue>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    let mut notes = Vec::new();
    for attribute in attributes {
        let attribute = attribute.trim();
        if attribute.is_empty() || !seen.insert(attribute) {
            continue;
        }
        match rows.distinct_values(attribute) {
            Some(distinct) => {
                debug!("Attribute {} has {} distinct values", attribute, distinct.len());
                values.extend(distinct.into_iter().map(|v| AttributeValue::new(attribute, v)));
            }
            None => {
                warn!("Attribute {} not found in {}", attribute, source);
                notes.push(format!(
                    "attribute '{}' not found in source '{}'",
                    attribute, source
                ));
            }
        }
    }
    (values, notes)
}

/// Domain and owner labels for every value, in input order
async fn classify_values(
    values: Vec<AttributeValue>,
    services: &Services,
    warnings: &mut Vec<String>,
) -> Vec<ClassifiedValue> {
    let owner_available = !services.owner_classifier.index().is_empty();
    if !owner_available && !values.is_empty() {
        warnings.push("owner index is empty; owner labels are Unknown".to_string());
    }

    let results: Vec<(ClassifiedValue, Vec<String>)> = stream::iter(values)
        .map(|value| async move {
            let mut notes = Vec::new();
            let (domain, domain_err) =
                services.domain_classifier.classify_or_unknown(&value.raw_value).await;
            if let Some(e) = domain_err {
                notes.push(format!(
                    "domain label of '{}' defaulted to Unknown: {}",
                    value.raw_value, e
                ));
            }

            let owner = if owner_available {
                let (owner, owner_err) =
                    services.owner_classifier.classify_or_unknown(&value.raw_value).await;
                if let Some(e) = owner_err {
                    notes.push(format!(
                        "owner label of '{}' defaulted to Unknown: {}",
                        value.raw_value, e
                    ));
                }
                owner
            } else {
                Classification::unknown()
            };

            let classified = ClassifiedValue {
                domain: ClassificationResult::new(value, domain),
                owner,
            };
            (classified, notes)
        })
        .buffered(CLASSIFY_CONCURRENCY)
        .collect()
        .await;

    results
        .into_iter()
        .map(|(classified, notes)| {
            warnings.extend(notes);
            classified
        })
        .collect()
}

/// Highest of the classified pair and the source's declared pair
fn resolve_value(
    classified: &ClassifiedValue,
    metadata: Option<&SourceMetadata>,
    services: &Services,
) -> SensitivityLevel {
    let level = services.policy.resolve(LabelQuery::Pair {
        domain: &classified.domain.matched_label,
        owner: &classified.owner.label,
    });
    match metadata {
        Some(meta) => level.max(services.policy.resolve(LabelQuery::Pair {
            domain: &meta.domain,
            owner: &meta.about,
        })),
        None => level,
    }
}

async fn invoke_engine(
    job: AnonymizationJob,
    tagged: &[TaggedValue],
    services: &Services,
    warnings: &mut Vec<String>,
) -> (Vec<AnonymizedCell>, EngineSummary) {
    let run = services.engine.run(job).await;

    if let Some(path) = &run.retained_output {
        warnings.push(format!("engine output retained at {}", path.display()));
    }

    let mut summary = EngineSummary {
        status: EngineStatus::Success,
        protocol_version: PROTOCOL_VERSION,
        error_kind: None,
        message: None,
        metrics: run.metrics,
        retained_output: run.retained_output,
        elapsed_ms: Some(run.elapsed.as_millis() as u64),
    };

    match run.outcome {
        Ok(report) => {
            if report.outputs.len() != tagged.len() {
                warnings.push(format!(
                    "engine returned {} results for {} values",
                    report.outputs.len(),
                    tagged.len()
                ));
            }
            (pair_outputs(tagged, &report.outputs), summary)
        }
        Err(e) => {
            warnings.push(format!("anonymization engine: {}", e));
            summary.status = EngineStatus::from_error(&e);
            summary.error_kind = Some(e.kind());
            summary.message = Some(e.to_string());
            (Vec::new(), summary)
        }
    }
}
