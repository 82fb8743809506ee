use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Free-form key/value data attached to a payment.
pub type Metadata = BTreeMap<String, String>;

/// Supported settlement currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Gbp];

    pub fn as_str(self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Eur => "eur",
            Currency::Gbp => "gbp",
        }
    }
}

impl FromStr for Currency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL.into_iter().find(|c| c.as_str() == s).ok_or(())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    RequiresReview,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Succeeded | PaymentStatus::Failed)
    }

    /// Whether the payment counts towards the organization's spend volume.
    pub fn counts_towards_volume(self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Succeeded)
    }
}

/// Refund lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

impl RefundStatus {
    /// Failed and canceled refunds returned no money and do not count against the payment.
    pub fn is_effective(self) -> bool {
        !matches!(self, RefundStatus::Failed | RefundStatus::Canceled)
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RefundStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    CustomerRequest,
    Duplicate,
    Fraudulent,
}

impl RefundReason {
    pub const ALL: [RefundReason; 3] = [
        RefundReason::CustomerRequest,
        RefundReason::Duplicate,
        RefundReason::Fraudulent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RefundReason::CustomerRequest => "customer_request",
            RefundReason::Duplicate => "duplicate",
            RefundReason::Fraudulent => "fraudulent",
        }
    }
}

impl FromStr for RefundReason {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RefundReason::ALL.into_iter().find(|r| r.as_str() == s).ok_or(())
    }
}

/// Organization role of the acting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            "viewer" => Ok(Role::Viewer),
            _ => Err(()),
        }
    }
}

/// Authenticated identity performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
    /// Coarse client location (e.g. country code) used by the geographic fraud signal.
    pub location: Option<String>,
}

/// Dispute flag set by processor notifications. Never changes payment status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub reason: Option<String>,
    pub flagged_at: DateTime<Utc>,
}

/// Payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub requester_id: Uuid,
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub payment_method_id: String,
    pub processor_reference_id: Option<String>,
    pub idempotency_key: String,
    pub fraud_score: f64,
    pub description: Option<String>,
    pub metadata: Metadata,
    pub origin: Option<String>,
    pub dispute: Option<Dispute>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Whether a repeated charge request describes the same logical payment.
    pub fn matches_request(&self, charge: &ValidatedCharge) -> bool {
        self.amount == charge.amount
            && self.currency == charge.currency
            && self.payment_method_id == charge.payment_method_id
            && self.description == charge.description
            && self.metadata == charge.metadata
    }
}

/// Refund record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount: i64,
    pub reason: RefundReason,
    pub status: RefundStatus,
    pub processor_reference_id: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inbound charge request as bound from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub payment_method_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub idempotency_key: String,
}

/// Inbound refund request as bound from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub reason: String,
}

/// Inbound review decision as bound from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub decision: String,
}

/// Charge request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCharge {
    pub amount: i64,
    pub currency: Currency,
    pub payment_method_id: String,
    pub description: Option<String>,
    pub metadata: Metadata,
    pub idempotency_key: String,
}

/// Refund request that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedRefund {
    pub amount: i64,
    pub reason: RefundReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Decline,
}
