use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::database::contact_events::{self, event_type};

/// One node of an automation's step graph. Persisted as a JSON array on
/// the automation row; the serialized form is owned by admin UIs and
/// must round-trip unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AutomationStep {
    Trigger { id: String, config: TriggerConfig },
    Wait { id: String, config: WaitConfig },
    Condition { id: String, config: ConditionConfig },
    Action { id: String, config: ActionConfig },
}

impl AutomationStep {
    pub fn id(&self) -> &str {
        match self {
            AutomationStep::Trigger { id, .. }
            | AutomationStep::Wait { id, .. }
            | AutomationStep::Condition { id, .. }
            | AutomationStep::Action { id, .. } => id,
        }
    }

    /// The explicit `next` edge, where the step type has one. Conditions
    /// branch through `nextYes`/`nextNo` instead.
    pub fn explicit_next(&self) -> Option<&str> {
        match self {
            AutomationStep::Trigger { config, .. } => config.next.as_deref(),
            AutomationStep::Wait { config, .. } => config.next.as_deref(),
            AutomationStep::Action { config, .. } => config.next.as_deref(),
            AutomationStep::Condition { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    #[serde(rename = "trigger.form_submitted")]
    FormSubmitted,
    #[serde(rename = "trigger.email_open")]
    EmailOpen,
    #[serde(rename = "trigger.link_click")]
    LinkClick,
    #[serde(rename = "trigger.tag_added")]
    TagAdded,
    #[serde(rename = "trigger.tag_removed")]
    TagRemoved,
    #[serde(rename = "trigger.list_joined")]
    ListJoined,
    #[serde(rename = "trigger.list_left")]
    ListLeft,
    #[serde(rename = "trigger.page_visited")]
    PageVisited,
    #[serde(rename = "trigger.purchase")]
    Purchase,
    #[serde(rename = "trigger.purchase_upgraded")]
    PurchaseUpgraded,
    #[serde(rename = "trigger.purchase_cancelled")]
    PurchaseCancelled,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::FormSubmitted => "trigger.form_submitted",
            TriggerKind::EmailOpen => "trigger.email_open",
            TriggerKind::LinkClick => "trigger.link_click",
            TriggerKind::TagAdded => "trigger.tag_added",
            TriggerKind::TagRemoved => "trigger.tag_removed",
            TriggerKind::ListJoined => "trigger.list_joined",
            TriggerKind::ListLeft => "trigger.list_left",
            TriggerKind::PageVisited => "trigger.page_visited",
            TriggerKind::Purchase => "trigger.purchase",
            TriggerKind::PurchaseUpgraded => "trigger.purchase_upgraded",
            TriggerKind::PurchaseCancelled => "trigger.purchase_cancelled",
        }
    }

    fn required_event_type(&self) -> &'static str {
        match self {
            TriggerKind::FormSubmitted => event_type::FORM_SUBMITTED,
            TriggerKind::EmailOpen => event_type::EMAIL_OPEN,
            TriggerKind::LinkClick => event_type::LINK_CLICK,
            TriggerKind::TagAdded => event_type::TAG_ADDED,
            TriggerKind::TagRemoved => event_type::TAG_REMOVED,
            TriggerKind::ListJoined => event_type::LIST_JOINED,
            TriggerKind::ListLeft => event_type::LIST_LEFT,
            TriggerKind::PageVisited => event_type::PAGE_VISITED,
            TriggerKind::Purchase => event_type::PURCHASE,
            TriggerKind::PurchaseUpgraded => event_type::PURCHASE_UPGRADED,
            TriggerKind::PurchaseCancelled => event_type::PURCHASE_CANCELLED,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerConfig {
    pub kind: TriggerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(default, rename = "campaignId", skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, rename = "urlContains", skip_serializing_if = "Option::is_none")]
    pub url_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl TriggerConfig {
    /// Whether an event fires this trigger.
    pub fn matches(&self, event: &contact_events::Model) -> bool {
        if event.event_type != self.kind.required_event_type() {
            return false;
        }
        let meta = event.meta_value();
        match self.kind {
            TriggerKind::FormSubmitted => match non_empty(&self.form) {
                None => true,
                Some(want) => {
                    meta_str(&meta, "form") == Some(want) || meta_str(&meta, "formName") == Some(want)
                }
            },
            TriggerKind::EmailOpen => match non_empty(&self.campaign_id) {
                None => true,
                Some(want) => event.campaign_id.as_deref() == Some(want),
            },
            TriggerKind::LinkClick => {
                let campaign_ok = match non_empty(&self.campaign_id) {
                    None => true,
                    Some(want) => event.campaign_id.as_deref() == Some(want),
                };
                let url_ok = match non_empty(&self.url_contains) {
                    None => true,
                    Some(want) => meta_str(&meta, "url")
                        .map(|url| url.to_lowercase().contains(&want.to_lowercase()))
                        .unwrap_or(false),
                };
                campaign_ok && url_ok
            }
            TriggerKind::TagAdded | TriggerKind::TagRemoved => {
                meta_contains(&meta, "tag", &self.tag)
            }
            TriggerKind::ListJoined | TriggerKind::ListLeft => {
                meta_contains(&meta, "list", &self.list)
            }
            TriggerKind::PageVisited => match non_empty(&self.url_contains) {
                None => true,
                Some(want) => meta_str(&meta, "url")
                    .map(|url| url.to_lowercase().contains(&want.to_lowercase()))
                    .unwrap_or(false),
            },
            TriggerKind::Purchase | TriggerKind::PurchaseUpgraded | TriggerKind::PurchaseCancelled => {
                true
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub days: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    #[serde(rename = "condition.lead_score")]
    LeadScore,
    #[serde(rename = "condition.lifecycle_stage")]
    LifecycleStage,
    #[serde(rename = "condition.last_open_days")]
    LastOpenDays,
    #[serde(rename = "condition.has_tag")]
    HasTag,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionConfig {
    pub kind: ConditionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<CmpOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, rename = "nextYes", skip_serializing_if = "Option::is_none")]
    pub next_yes: Option<String>,
    #[serde(default, rename = "nextNo", skip_serializing_if = "Option::is_none")]
    pub next_no: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
}

impl CmpOp {
    pub fn compare(self, left: f64, right: f64) -> bool {
        match self {
            CmpOp::Gt => left > right,
            CmpOp::Gte => left >= right,
            CmpOp::Lt => left < right,
            CmpOp::Lte => left <= right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "action.send_email")]
    SendEmail,
    #[serde(rename = "action.update_field")]
    UpdateField,
    #[serde(rename = "action.notify")]
    Notify,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionConfig {
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Id-addressed view over a step list. Steps are persisted as an ordered
/// JSON array; edges are step-id strings, and the fallback edge is the
/// next step in list order.
pub struct StepGraph {
    steps: Vec<AutomationStep>,
    index: HashMap<String, usize>,
}

impl StepGraph {
    pub fn new(steps: Vec<AutomationStep>) -> Self {
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, step)| (step.id().to_string(), i))
            .collect();
        Self { steps, index }
    }

    pub fn get(&self, id: &str) -> Option<&AutomationStep> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    pub fn triggers(&self) -> impl Iterator<Item = (&AutomationStep, &TriggerConfig)> {
        self.steps.iter().filter_map(|step| match step {
            AutomationStep::Trigger { config, .. } => Some((step, config)),
            _ => None,
        })
    }

    /// Default successor: the explicit `next` edge if set, otherwise the
    /// positionally next step.
    pub fn successor_of(&self, step: &AutomationStep) -> Option<&AutomationStep> {
        if let Some(next_id) = step.explicit_next() {
            return self.get(next_id);
        }
        let i = *self.index.get(step.id())?;
        self.steps.get(i + 1)
    }

    /// Branch successor for conditions: the named target, or nothing.
    pub fn branch_target(&self, target: Option<&str>) -> Option<&AutomationStep> {
        self.get(target?)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn meta_str<'a>(meta: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(|v| v.as_str())
}

/// Tag/list trigger predicate: empty config matches anything, otherwise
/// the event's value must contain the configured one (case-insensitive).
fn meta_contains(meta: &serde_json::Value, key: &str, configured: &Option<String>) -> bool {
    match non_empty(configured) {
        None => true,
        Some(want) => meta_str(meta, key)
            .map(|have| have.to_lowercase().contains(&want.to_lowercase()))
            .unwrap_or(false),
    }
}
