//! Row encoding between a [`LedgerSnapshot`] and the six remote tables.
//!
//! Every table starts with a header row. Decoding maps columns by header name, so
//! columns reordered by hand in the spreadsheet still decode; unknown columns are ignored.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::{Error, Result};

use super::ledger_model::{
    Budget, Category, Frequency, Goal, LedgerSnapshot, Member, RecurringRule, Transaction,
    TransactionKind, Wallet,
};

/// One spreadsheet row, as plain cell strings.
pub type TableRow = Vec<String>;

pub const TRANSACTIONS_TABLE: &str = "transactions";
pub const RECURRING_TABLE: &str = "recurring";
pub const GOALS_TABLE: &str = "goals";
pub const BUDGETS_TABLE: &str = "budgets";
pub const WALLETS_TABLE: &str = "wallets";
pub const CATEGORIES_TABLE: &str = "categories";

/// Canonical list of remote tables, in push/pull order.
pub const LEDGER_TABLES: [&str; 6] = [
    TRANSACTIONS_TABLE,
    RECURRING_TABLE,
    GOALS_TABLE,
    BUDGETS_TABLE,
    WALLETS_TABLE,
    CATEGORIES_TABLE,
];

const TRANSACTION_HEADERS: [&str; 9] = [
    "id",
    "date",
    "description",
    "amount",
    "kind",
    "category_id",
    "wallet_id",
    "member_id",
    "notes",
];
const RECURRING_HEADERS: [&str; 9] = [
    "id",
    "description",
    "amount",
    "kind",
    "category_id",
    "wallet_id",
    "frequency",
    "next_due",
    "active",
];
const GOAL_HEADERS: [&str; 5] = ["id", "name", "target_amount", "saved_amount", "deadline"];
const BUDGET_HEADERS: [&str; 4] = ["id", "category_id", "month", "limit"];
const WALLET_HEADERS: [&str; 3] = ["id", "name", "opening_balance"];
const CATEGORY_HEADERS: [&str; 5] = ["record_type", "id", "name", "kind", "color"];

const RECORD_TYPE_CATEGORY: &str = "category";
const RECORD_TYPE_MEMBER: &str = "member";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTable {
    pub name: &'static str,
    pub rows: Vec<TableRow>,
}

fn header(columns: &[&str]) -> TableRow {
    columns.iter().map(|c| c.to_string()).collect()
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn date_cell(value: NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

/// Encode the snapshot as one header-prefixed rowset per table, in [`LEDGER_TABLES`] order.
pub fn encode_snapshot(snapshot: &LedgerSnapshot) -> Vec<EncodedTable> {
    let mut transactions = vec![header(&TRANSACTION_HEADERS)];
    transactions.extend(snapshot.transactions.iter().map(|t| {
        vec![
            t.id.clone(),
            date_cell(t.date),
            t.description.clone(),
            t.amount.to_string(),
            t.kind.as_str().to_string(),
            opt(&t.category_id),
            opt(&t.wallet_id),
            opt(&t.member_id),
            opt(&t.notes),
        ]
    }));

    let mut recurring = vec![header(&RECURRING_HEADERS)];
    recurring.extend(snapshot.recurring.iter().map(|r| {
        vec![
            r.id.clone(),
            r.description.clone(),
            r.amount.to_string(),
            r.kind.as_str().to_string(),
            opt(&r.category_id),
            opt(&r.wallet_id),
            r.frequency.as_str().to_string(),
            date_cell(r.next_due),
            r.active.to_string(),
        ]
    }));

    let mut goals = vec![header(&GOAL_HEADERS)];
    goals.extend(snapshot.goals.iter().map(|g| {
        vec![
            g.id.clone(),
            g.name.clone(),
            g.target_amount.to_string(),
            g.saved_amount.to_string(),
            g.deadline.map(date_cell).unwrap_or_default(),
        ]
    }));

    let mut budgets = vec![header(&BUDGET_HEADERS)];
    budgets.extend(snapshot.budgets.iter().map(|b| {
        vec![
            b.id.clone(),
            b.category_id.clone(),
            b.month.clone(),
            b.limit.to_string(),
        ]
    }));

    let mut wallets = vec![header(&WALLET_HEADERS)];
    wallets.extend(
        snapshot
            .wallets
            .iter()
            .map(|w| vec![w.id.clone(), w.name.clone(), w.opening_balance.to_string()]),
    );

    let mut categories = vec![header(&CATEGORY_HEADERS)];
    categories.extend(snapshot.categories.iter().map(|c| {
        vec![
            RECORD_TYPE_CATEGORY.to_string(),
            c.id.clone(),
            c.name.clone(),
            c.kind.as_str().to_string(),
            opt(&c.color),
        ]
    }));
    categories.extend(snapshot.members.iter().map(|m| {
        vec![
            RECORD_TYPE_MEMBER.to_string(),
            m.id.clone(),
            m.name.clone(),
            String::new(),
            String::new(),
        ]
    }));

    vec![
        EncodedTable {
            name: TRANSACTIONS_TABLE,
            rows: transactions,
        },
        EncodedTable {
            name: RECURRING_TABLE,
            rows: recurring,
        },
        EncodedTable {
            name: GOALS_TABLE,
            rows: goals,
        },
        EncodedTable {
            name: BUDGETS_TABLE,
            rows: budgets,
        },
        EncodedTable {
            name: WALLETS_TABLE,
            rows: wallets,
        },
        EncodedTable {
            name: CATEGORIES_TABLE,
            rows: categories,
        },
    ]
}

/// Cell accessor for one data row, resolving columns through the table header.
struct RowReader<'a> {
    table: &'static str,
    index: usize,
    columns: &'a HashMap<String, usize>,
    cells: &'a [String],
}

impl<'a> RowReader<'a> {
    fn text(&self, column: &str) -> &'a str {
        self.columns
            .get(column)
            .and_then(|idx| self.cells.get(*idx))
            .map(|cell| cell.trim())
            .unwrap_or("")
    }

    fn optional(&self, column: &str) -> Option<String> {
        let value = self.text(column);
        (!value.is_empty()).then(|| value.to_string())
    }

    fn required(&self, column: &str) -> Result<String> {
        self.optional(column)
            .ok_or_else(|| self.error(format!("missing '{}'", column)))
    }

    fn decimal(&self, column: &str) -> Result<Decimal> {
        let raw = self.text(column);
        if raw.is_empty() {
            return Ok(Decimal::ZERO);
        }
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|e| self.error(format!("invalid amount '{}' in '{}': {}", raw, column, e)))
    }

    fn date(&self, column: &str) -> Result<NaiveDate> {
        let raw = self.required(column)?;
        NaiveDate::parse_from_str(&raw, DATE_FORMAT)
            .map_err(|e| self.error(format!("invalid date '{}' in '{}': {}", raw, column, e)))
    }

    fn optional_date(&self, column: &str) -> Result<Option<NaiveDate>> {
        if self.text(column).is_empty() {
            return Ok(None);
        }
        self.date(column).map(Some)
    }

    fn flag(&self, column: &str) -> bool {
        matches!(
            self.text(column).to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        )
    }

    fn kind(&self, column: &str) -> Result<TransactionKind> {
        let raw = self.text(column);
        TransactionKind::parse(raw)
            .ok_or_else(|| self.error(format!("unknown kind '{}'", raw)))
    }

    fn frequency(&self, column: &str) -> Result<Frequency> {
        let raw = self.text(column);
        Frequency::parse(raw).ok_or_else(|| self.error(format!("unknown frequency '{}'", raw)))
    }

    fn error(&self, message: String) -> Error {
        // +2: one for the header row, one for 1-based spreadsheet rows.
        Error::codec(self.table, self.index + 2, message)
    }
}

fn decode_rows<T>(
    table: &'static str,
    rows: &[TableRow],
    decode: impl Fn(&RowReader<'_>) -> Result<Option<T>>,
) -> Result<Vec<T>> {
    let Some((head, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    let columns: HashMap<String, usize> = head
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_ascii_lowercase(), idx))
        .collect();
    if !columns.contains_key("id") {
        return Err(Error::codec(table, 1, "header row has no 'id' column"));
    }

    let mut records = Vec::with_capacity(body.len());
    for (index, cells) in body.iter().enumerate() {
        if cells.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let reader = RowReader {
            table,
            index,
            columns: &columns,
            cells,
        };
        if let Some(record) = decode(&reader)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Decode rowsets read in [`LEDGER_TABLES`] order back into a snapshot.
pub fn decode_snapshot(tables: &[Vec<TableRow>]) -> Result<LedgerSnapshot> {
    if tables.len() != LEDGER_TABLES.len() {
        return Err(Error::invalid_input(format!(
            "expected {} tables, got {}",
            LEDGER_TABLES.len(),
            tables.len()
        )));
    }

    let transactions = decode_rows(TRANSACTIONS_TABLE, &tables[0], |row| {
        Ok(Some(Transaction {
            id: row.required("id")?,
            date: row.date("date")?,
            description: row.text("description").to_string(),
            amount: row.decimal("amount")?,
            kind: row.kind("kind")?,
            category_id: row.optional("category_id"),
            wallet_id: row.optional("wallet_id"),
            member_id: row.optional("member_id"),
            notes: row.optional("notes"),
        }))
    })?;

    let recurring = decode_rows(RECURRING_TABLE, &tables[1], |row| {
        Ok(Some(RecurringRule {
            id: row.required("id")?,
            description: row.text("description").to_string(),
            amount: row.decimal("amount")?,
            kind: row.kind("kind")?,
            category_id: row.optional("category_id"),
            wallet_id: row.optional("wallet_id"),
            frequency: row.frequency("frequency")?,
            next_due: row.date("next_due")?,
            active: row.flag("active"),
        }))
    })?;

    let goals = decode_rows(GOALS_TABLE, &tables[2], |row| {
        Ok(Some(Goal {
            id: row.required("id")?,
            name: row.text("name").to_string(),
            target_amount: row.decimal("target_amount")?,
            saved_amount: row.decimal("saved_amount")?,
            deadline: row.optional_date("deadline")?,
        }))
    })?;

    let budgets = decode_rows(BUDGETS_TABLE, &tables[3], |row| {
        Ok(Some(Budget {
            id: row.required("id")?,
            category_id: row.required("category_id")?,
            month: row.required("month")?,
            limit: row.decimal("limit")?,
        }))
    })?;

    let wallets = decode_rows(WALLETS_TABLE, &tables[4], |row| {
        Ok(Some(Wallet {
            id: row.required("id")?,
            name: row.text("name").to_string(),
            opening_balance: row.decimal("opening_balance")?,
        }))
    })?;

    let categories = decode_rows(CATEGORIES_TABLE, &tables[5], |row| {
        if row.text("record_type") == RECORD_TYPE_MEMBER {
            return Ok(None);
        }
        Ok(Some(Category {
            id: row.required("id")?,
            name: row.text("name").to_string(),
            kind: row.kind("kind")?,
            color: row.optional("color"),
        }))
    })?;

    let members = decode_rows(CATEGORIES_TABLE, &tables[5], |row| {
        if row.text("record_type") != RECORD_TYPE_MEMBER {
            return Ok(None);
        }
        Ok(Some(Member {
            id: row.required("id")?,
            name: row.text("name").to_string(),
        }))
    })?;

    Ok(LedgerSnapshot {
        transactions,
        recurring,
        goals,
        budgets,
        wallets,
        categories,
        members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(cells: &[&str]) -> TableRow {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sample_snapshot() -> LedgerSnapshot {
        LedgerSnapshot {
            transactions: vec![Transaction {
                id: "t1".to_string(),
                date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
                description: "Farmers market".to_string(),
                amount: dec!(42.50),
                kind: TransactionKind::Expense,
                category_id: Some("food".to_string()),
                wallet_id: Some("cash".to_string()),
                member_id: Some("m1".to_string()),
                notes: None,
            }],
            recurring: vec![RecurringRule {
                id: "r1".to_string(),
                description: "Internet".to_string(),
                amount: dec!(59.99),
                kind: TransactionKind::Expense,
                category_id: Some("utilities".to_string()),
                wallet_id: None,
                frequency: Frequency::Monthly,
                next_due: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                active: true,
            }],
            goals: vec![Goal {
                id: "g1".to_string(),
                name: "Emergency fund".to_string(),
                target_amount: dec!(10000),
                saved_amount: dec!(2500),
                deadline: None,
            }],
            budgets: vec![Budget {
                id: "b1".to_string(),
                category_id: "food".to_string(),
                month: "2026-05".to_string(),
                limit: dec!(600),
            }],
            wallets: vec![Wallet {
                id: "cash".to_string(),
                name: "Cash".to_string(),
                opening_balance: dec!(120),
            }],
            categories: vec![Category {
                id: "food".to_string(),
                name: "Food".to_string(),
                kind: TransactionKind::Expense,
                color: Some("#ff8800".to_string()),
            }],
            members: vec![Member {
                id: "m1".to_string(),
                name: "Alex".to_string(),
            }],
        }
    }

    #[test]
    fn encoded_snapshot_decodes_to_the_same_ledger() {
        let snapshot = sample_snapshot();
        let tables: Vec<Vec<TableRow>> = encode_snapshot(&snapshot)
            .into_iter()
            .map(|table| table.rows)
            .collect();
        assert_eq!(tables.len(), LEDGER_TABLES.len());
        assert_eq!(tables[5].len(), 3, "header + category + member");

        let decoded = decode_snapshot(&tables).expect("decode");
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn empty_tables_decode_to_empty_snapshot() {
        let tables = vec![Vec::new(); LEDGER_TABLES.len()];
        assert!(decode_snapshot(&tables).unwrap().is_empty());
    }

    #[test]
    fn reordered_columns_and_blank_rows_are_tolerated() {
        let mut tables = vec![Vec::new(); LEDGER_TABLES.len()];
        tables[4] = vec![
            row(&["name", "opening_balance", "id", "comment"]),
            row(&["Savings", "1000.5", "w9", "added by hand"]),
            row(&["", "", "", ""]),
        ];
        let decoded = decode_snapshot(&tables).unwrap();
        assert_eq!(decoded.wallets.len(), 1);
        assert_eq!(decoded.wallets[0].id, "w9");
        assert_eq!(decoded.wallets[0].opening_balance, dec!(1000.5));
    }

    #[test]
    fn bad_cell_reports_spreadsheet_row() {
        let mut tables = vec![Vec::new(); LEDGER_TABLES.len()];
        tables[0] = vec![
            header(&TRANSACTION_HEADERS),
            row(&["t1", "2026-13-40", "x", "1", "expense", "", "", "", ""]),
        ];
        let err = decode_snapshot(&tables).unwrap_err();
        match err {
            Error::Codec { table, row, .. } => {
                assert_eq!(table, TRANSACTIONS_TABLE);
                assert_eq!(row, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
