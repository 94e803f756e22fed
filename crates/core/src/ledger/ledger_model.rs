//! Household ledger records and the snapshot that is synced as one unit.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}

/// Cadence of a recurring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    /// Next occurrence after `date`. Month arithmetic clamps to the last day of the month.
    pub fn advance(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Weekly => date + chrono::Duration::days(7),
            Self::Monthly => date.checked_add_months(Months::new(1)).unwrap_or(date),
            Self::Yearly => date.checked_add_months(Months::new(12)).unwrap_or(date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub category_id: Option<String>,
    pub wallet_id: Option<String>,
    pub member_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringRule {
    pub id: String,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub category_id: Option<String>,
    pub wallet_id: Option<String>,
    pub frequency: Frequency,
    pub next_due: NaiveDate,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub target_amount: Decimal,
    pub saved_amount: Decimal,
    pub deadline: Option<NaiveDate>,
}

impl Goal {
    pub fn is_achieved(&self) -> bool {
        self.saved_amount >= self.target_amount
    }
}

/// Monthly spending limit for one category. `month` is `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: String,
    pub category_id: String,
    pub month: String,
    pub limit: Decimal,
}

impl Budget {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.month == format!("{:04}-{:02}", date.year(), date.month())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub name: String,
    pub opening_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub kind: TransactionKind,
    pub color: Option<String>,
}

/// Household member a transaction can be attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
}

/// The full set of synchronized collections. Push and pull always move the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerSnapshot {
    pub transactions: Vec<Transaction>,
    pub recurring: Vec<RecurringRule>,
    pub goals: Vec<Goal>,
    pub budgets: Vec<Budget>,
    pub wallets: Vec<Wallet>,
    pub categories: Vec<Category>,
    pub members: Vec<Member>,
}

impl LedgerSnapshot {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
            && self.recurring.is_empty()
            && self.goals.is_empty()
            && self.budgets.is_empty()
            && self.wallets.is_empty()
            && self.categories.is_empty()
            && self.members.is_empty()
    }

    /// Current balance of a wallet: opening balance plus income minus expenses booked to it.
    pub fn wallet_balance(&self, wallet_id: &str) -> Option<Decimal> {
        let wallet = self.wallets.iter().find(|w| w.id == wallet_id)?;
        let movements: Decimal = self
            .transactions
            .iter()
            .filter(|t| t.wallet_id.as_deref() == Some(wallet_id))
            .map(|t| match t.kind {
                TransactionKind::Income => t.amount,
                TransactionKind::Expense => -t.amount,
                TransactionKind::Transfer => Decimal::ZERO,
            })
            .sum();
        Some(wallet.opening_balance + movements)
    }

    /// Total expenses booked against a budget's category in the budget's month.
    pub fn budget_spent(&self, budget: &Budget) -> Decimal {
        self.transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Expense)
            .filter(|t| t.category_id.as_deref() == Some(budget.category_id.as_str()))
            .filter(|t| budget.covers(t.date))
            .map(|t| t.amount)
            .sum()
    }
}

/// Record kinds addressable by id inside a [`LedgerSnapshot`].
pub trait LedgerRecord: Clone + Send + Sync + 'static {
    const ENTITY: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn collection(snapshot: &LedgerSnapshot) -> &Vec<Self>;
    fn collection_mut(snapshot: &mut LedgerSnapshot) -> &mut Vec<Self>;
}

macro_rules! ledger_record {
    ($ty:ty, $entity:literal, $field:ident) => {
        impl LedgerRecord for $ty {
            const ENTITY: &'static str = $entity;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn collection(snapshot: &LedgerSnapshot) -> &Vec<Self> {
                &snapshot.$field
            }

            fn collection_mut(snapshot: &mut LedgerSnapshot) -> &mut Vec<Self> {
                &mut snapshot.$field
            }
        }
    };
}

ledger_record!(Transaction, "transaction", transactions);
ledger_record!(RecurringRule, "recurring rule", recurring);
ledger_record!(Goal, "goal", goals);
ledger_record!(Budget, "budget", budgets);
ledger_record!(Wallet, "wallet", wallets);
ledger_record!(Category, "category", categories);
ledger_record!(Member, "member", members);
