use serde::{Deserialize, Serialize};

/// One line item on a receipt, owned by a [`Bill`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillItem {
    pub id: i64,
    pub name: String,
    pub price: f64,
}

/// A person's slice of a single item; `is_shared` marks an item split
/// among multiple people.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetail {
    pub name: String,
    pub amount: f64,
    pub is_shared: bool,
}

/// One person's computed portion of a bill. The backend guarantees
/// `total == subtotal + tax_share + tip_share`; it is not re-checked here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonShare {
    pub id: i64,
    pub person_name: String,
    pub items: Vec<ItemDetail>,
    pub subtotal: f64,
    pub tax_share: f64,
    pub tip_share: f64,
    pub total: f64,
}

/// A way to pay the bill's owner. The identifier is a free-text handle;
/// Venmo methods are located by substring match on `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub name: String,
    pub identifier: String,
}

/// A single itemized receipt, standalone or part of a [`Tab`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: i64,
    pub name: String,
    pub subtotal: f64,
    pub tax: f64,
    pub tip_amount: f64,
    pub tip_percentage: f64,
    pub total: f64,
    pub date: String,
    pub payment_methods: Vec<PaymentMethod>,
    pub items: Vec<BillItem>,
    pub person_shares: Vec<PersonShare>,
}

/// A collection of bills grouped over time. While `finalized` is false the
/// viewer shows derived per-person totals; afterwards the backend's
/// settlements are authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub bills: Vec<Bill>,
    pub total_amount: f64,
    pub finalized: bool,
    pub finalized_at: Option<String>,
    pub created_at: String,
}

/// Derived per-person balance across a tab's bills. Produced only by
/// [`crate::totals::compute_tab_person_totals`], never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabPersonTotal {
    pub person_name: String,
    pub total: f64,
    pub bill_count: u32,
}

/// Fixed amount a person owes once a tab is finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabSettlement {
    pub id: i64,
    pub tab_id: i64,
    pub person_name: String,
    pub amount: f64,
    pub paid: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabMember {
    pub id: i64,
    pub tab_id: i64,
    pub display_name: String,
    pub role: String,
    pub joined_at: String,
}

/// Receipt image uploaded to a tab; `processed` means receipt OCR has
/// completed upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabImage {
    pub id: i64,
    pub tab_id: i64,
    pub filename: String,
    pub url: String,
    pub size: i64,
    pub mime_type: String,
    pub processed: bool,
    pub uploaded_by: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct JoinRequest {
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub member_id: i64,
    pub member_token: String,
    pub display_name: String,
    pub role: String,
}

/// The one piece of locally persisted state: the credential cached after
/// joining a tab, keyed by tab id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberCredential {
    pub member_token: String,
    pub display_name: String,
}
