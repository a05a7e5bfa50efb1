//! Deal descriptor, stage transitions and pipeline aggregates.

use crate::fields;
use crate::model::record::{now_epoch_ms, Record, RecordId, TenantId};
use crate::repo::{ListFilter, RecordRepository, RepoResult};
use crate::schema::{
    DefaultValue, EntitySchema, FieldDef, FieldRule, FieldValue, FilterDef, SortSpec,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Pipeline stages in funnel order.
pub const DEAL_STAGES: &[&str] = &[
    "lead",
    "qualified",
    "proposal",
    "negotiation",
    "closed_won",
    "closed_lost",
];
pub const DEAL_STATUSES: &[&str] = &["open", "won", "lost", "abandoned"];

pub static SCHEMA: EntitySchema = EntitySchema {
    entity: "deal",
    fields: &[
        FieldDef::text("name")
            .required()
            .rule(FieldRule::MaxLen(255)),
        FieldDef::text("description"),
        FieldDef::uuid("company_id").required(),
        FieldDef::uuid("contact_id"),
        FieldDef::uuid("owner_id"),
        FieldDef::text("stage")
            .required()
            .rule(FieldRule::Choices(DEAL_STAGES))
            .default_value(DefaultValue::Text("lead")),
        FieldDef::datetime("stage_changed_at"),
        FieldDef::integer("probability")
            .rule(FieldRule::IntRange(0, 100))
            .default_value(DefaultValue::Integer(0)),
        FieldDef::decimal("value").required(),
        FieldDef::text("currency")
            .rule(FieldRule::MaxLen(3))
            .default_value(DefaultValue::Text("USD")),
        FieldDef::date("expected_close_date"),
        FieldDef::date("actual_close_date"),
        FieldDef::text("status")
            .rule(FieldRule::Choices(DEAL_STATUSES))
            .default_value(DefaultValue::Text("open")),
        FieldDef::text("lost_reason").rule(FieldRule::MaxLen(255)),
        FieldDef::text("source").rule(FieldRule::MaxLen(100)),
        FieldDef::tags("tags"),
        FieldDef::text("next_step").rule(FieldRule::MaxLen(255)),
        FieldDef::text("notes"),
    ],
    filters: &[
        FilterDef::equality("stage"),
        FilterDef::equality("status"),
        FilterDef::equality("owner_id"),
        FilterDef::equality("company_id"),
        FilterDef::equality("contact_id"),
        FilterDef::equality("tags"),
        FilterDef::range("value"),
        FilterDef::range("probability"),
        FilterDef::range("expected_close_date"),
        FilterDef::substring("name"),
    ],
    export_fields: &[
        "name",
        "stage",
        "status",
        "value",
        "currency",
        "probability",
        "expected_close_date",
        "actual_close_date",
        "company_id",
        "contact_id",
        "source",
        "tags",
        "next_step",
        "notes",
    ],
    default_sort: SortSpec::NEWEST_FIRST,
};

/// Open deals aggregated for one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: String,
    pub count: u64,
    pub total_value: f64,
    pub avg_probability: f64,
    /// Sum of `value * probability / 100`.
    pub total_expected: f64,
}

/// Probability-weighted revenue of open deals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Forecast {
    pub deal_count: u64,
    pub total_forecast: f64,
}

entity_repository!(
    /// Deals of one tenant and their sales pipeline.
    DealRepository,
    SCHEMA
);

impl DealRepository<'_> {
    /// Moves a deal to `stage`, stamping `stage_changed_at`.
    ///
    /// Closing stages also set status, final probability and close date;
    /// moving back to an open stage reopens the deal.
    pub fn move_stage(&self, tenant: TenantId, id: RecordId, stage: &str) -> RepoResult<Record> {
        let mut patch = fields! {
            "stage" => stage,
            "stage_changed_at" => FieldValue::DateTime(now_epoch_ms()),
        };
        let today = FieldValue::Date(Utc::now().date_naive());
        let closing = match stage {
            "closed_won" => Some(("won", 100_i64)),
            "closed_lost" => Some(("lost", 0_i64)),
            _ => None,
        };
        match closing {
            Some((status, probability)) => {
                patch.insert("status".to_string(), FieldValue::from(status));
                patch.insert("probability".to_string(), FieldValue::Integer(probability));
                patch.insert("actual_close_date".to_string(), today);
            }
            None => {
                patch.insert("status".to_string(), FieldValue::from("open"));
                patch.insert("actual_close_date".to_string(), FieldValue::Null);
            }
        }
        self.records.update(tenant, id, patch)
    }

    /// Per-stage totals of open deals, in funnel order.
    pub fn pipeline_summary(&self, tenant: TenantId) -> RepoResult<Vec<StageSummary>> {
        let deals = self
            .records
            .collect_all(tenant, &ListFilter::new().eq("status", "open"))?;

        let mut summaries: Vec<StageSummary> = Vec::new();
        for stage in DEAL_STAGES {
            let in_stage: Vec<&Record> = deals
                .iter()
                .filter(|deal| deal.text("stage") == Some(*stage))
                .collect();
            if in_stage.is_empty() {
                continue;
            }

            let count = in_stage.len() as u64;
            let total_value: f64 = in_stage.iter().map(|deal| deal_value(deal)).sum();
            let total_probability: f64 = in_stage.iter().map(|deal| deal_probability(deal)).sum();
            let total_expected: f64 = in_stage.iter().map(|deal| expected_revenue(deal)).sum();
            summaries.push(StageSummary {
                stage: (*stage).to_string(),
                count,
                total_value,
                avg_probability: total_probability / count as f64,
                total_expected,
            });
        }
        Ok(summaries)
    }

    /// Weighted forecast of open deals, optionally for one owner.
    pub fn forecast(&self, tenant: TenantId, owner_id: Option<Uuid>) -> RepoResult<Forecast> {
        let mut filter = ListFilter::new().eq("status", "open");
        if let Some(owner_id) = owner_id {
            filter = filter.eq("owner_id", owner_id);
        }
        let deals = self.records.collect_all(tenant, &filter)?;
        Ok(Forecast {
            deal_count: deals.len() as u64,
            total_forecast: deals.iter().map(expected_revenue).sum(),
        })
    }
}

fn deal_value(deal: &Record) -> f64 {
    deal.get("value")
        .and_then(FieldValue::as_decimal)
        .unwrap_or_default()
}

fn deal_probability(deal: &Record) -> f64 {
    deal.get("probability")
        .and_then(FieldValue::as_decimal)
        .unwrap_or_default()
}

fn expected_revenue(deal: &Record) -> f64 {
    deal_value(deal) * deal_probability(deal) / 100.0
}
