use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::layout::{Align, Column, Font, PageLayout, TableRow, TableStyle};
use super::{draw_footer, draw_letterhead, french_date, RenderError};
use crate::tuition::allocation::{allocate, AllocationBreakdown, AllocationInput};
use crate::tuition::domain::{AcademicYear, PaymentMethod, ScheduleEntry, Xof};
use crate::tuition::money::format_xof;

pub const TABLE_LEFT: f32 = 40.0;
pub const HEADER_ROW_HEIGHT: f32 = 24.0;
pub const BODY_ROW_HEIGHT: f32 = 22.0;

/// Waterfall table columns.
pub const RECEIPT_COLUMNS: [Column; 4] = [
    Column {
        title: "Désignation",
        width: 235.0,
        align: Align::Left,
    },
    Column {
        title: "Montant dû",
        width: 90.0,
        align: Align::Right,
    },
    Column {
        title: "Montant payé",
        width: 90.0,
        align: Align::Right,
    },
    Column {
        title: "Reste à payer",
        width: 100.0,
        align: Align::Right,
    },
];

const RECEIPT_TABLE: TableStyle = TableStyle {
    header_height: HEADER_ROW_HEIGHT,
    row_height: BODY_ROW_HEIGHT,
    font_size: 9.0,
    padding: 6.0,
    header_fill: 0.9,
};

/// School identity printed at the top of every document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letterhead {
    pub school_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Letterhead {
    pub fn named(school_name: impl Into<String>) -> Self {
        Self {
            school_name: school_name.into(),
            address: None,
            phone: None,
            email: None,
        }
    }
}

/// Fully resolved receipt content.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub letterhead: Letterhead,
    pub receipt_number: String,
    pub issued_on: NaiveDate,
    pub student_name: String,
    pub matricule: String,
    pub class_name: String,
    pub academic_year: AcademicYear,
    pub payment_amount: Xof,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub reference: Option<String>,
    pub cashier: Option<String>,
    pub breakdown: AllocationBreakdown,
}

impl PaymentReceipt {
    pub fn file_stem(&self) -> String {
        format!("recu-{}-{}", self.matricule, self.receipt_number)
    }
}

/// JSON body of `POST /api/pdf/tuition-payment-receipt`.
///
/// `total_paid` and `first_payment_amount` default to the receipt's own payment, which is what a
/// student's first receipt needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptRequest {
    #[serde(default)]
    pub letterhead: Option<Letterhead>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub issued_on: Option<NaiveDate>,
    pub student_name: String,
    pub matricule: String,
    pub class_name: String,
    pub academic_year: AcademicYear,
    pub payment_amount: Xof,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub cashier: Option<String>,
    #[serde(default)]
    pub registration_fee: Xof,
    #[serde(default)]
    pub other_fees: Xof,
    pub tuition_amount: Xof,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
    #[serde(default)]
    pub total_paid: Option<Xof>,
    #[serde(default)]
    pub first_payment_amount: Option<Xof>,
}

impl ReceiptRequest {
    pub fn into_receipt(
        self,
        default_letterhead: &Letterhead,
        today: NaiveDate,
    ) -> Result<PaymentReceipt, RenderError> {
        if self.student_name.trim().is_empty() {
            return Err(RenderError::InvalidPayload("student_name is required".into()));
        }
        if self.payment_amount <= 0 {
            return Err(RenderError::InvalidPayload(
                "payment_amount must be greater than zero".into(),
            ));
        }
        let total_paid = self.total_paid.unwrap_or(self.payment_amount);
        if total_paid < self.payment_amount {
            return Err(RenderError::InvalidPayload(
                "total_paid cannot be lower than payment_amount".into(),
            ));
        }

        let input = AllocationInput {
            total_paid,
            registration_fee: self.registration_fee,
            other_fees: self.other_fees,
            tuition_amount: self.tuition_amount,
            schedule: &self.schedule,
            first_payment_amount: Some(self.first_payment_amount.unwrap_or(self.payment_amount)),
            academic_year: self.academic_year,
        };
        input
            .check()
            .map_err(|err| RenderError::InvalidPayload(err.to_string()))?;
        let breakdown = allocate(&input);

        let receipt_number = self
            .receipt_number
            .filter(|number| !number.trim().is_empty())
            .unwrap_or_else(|| format!("REC-{}", self.payment_date.format("%Y%m%d")));

        Ok(PaymentReceipt {
            letterhead: self
                .letterhead
                .unwrap_or_else(|| default_letterhead.clone()),
            receipt_number,
            issued_on: self.issued_on.unwrap_or(today),
            student_name: self.student_name,
            matricule: self.matricule,
            class_name: self.class_name,
            academic_year: self.academic_year,
            payment_amount: self.payment_amount,
            payment_date: self.payment_date,
            payment_method: self.payment_method,
            reference: self.reference,
            cashier: self.cashier,
            breakdown,
        })
    }
}

/// Waterfall rows as table cells, amounts formatted in F CFA.
pub fn breakdown_rows(breakdown: &AllocationBreakdown) -> Vec<TableRow> {
    breakdown
        .rows()
        .into_iter()
        .map(|row| TableRow {
            cells: vec![
                row.label,
                format_xof(row.due),
                format_xof(row.paid),
                format_xof(row.balance),
            ],
            emphasized: row.is_total,
        })
        .collect()
}

pub fn receipt_layout(receipt: &PaymentReceipt) -> PageLayout {
    let mut page = PageLayout::a4();
    let mut y = draw_letterhead(&mut page, &receipt.letterhead);

    y += 30.0;
    page.centered_text(y, 14.0, Font::Bold, "REÇU DE PAIEMENT - FRAIS DE SCOLARITÉ");
    y += 16.0;
    page.centered_text(
        y,
        10.0,
        Font::Regular,
        format!(
            "N° {}  -  Émis le {}",
            receipt.receipt_number,
            french_date(receipt.issued_on)
        ),
    );

    let mut entries: Vec<(&str, String)> = vec![
        ("Élève", receipt.student_name.clone()),
        ("Matricule", receipt.matricule.clone()),
        ("Classe", receipt.class_name.clone()),
        ("Année scolaire", receipt.academic_year.to_string()),
        ("Date du paiement", french_date(receipt.payment_date)),
        ("Mode de paiement", receipt.payment_method.label().to_string()),
    ];
    if let Some(reference) = &receipt.reference {
        entries.push(("Référence", reference.clone()));
    }
    entries.push(("Montant versé", format_xof(receipt.payment_amount)));

    let table_width: f32 = RECEIPT_COLUMNS.iter().map(|column| column.width).sum();
    y = page.info_box(TABLE_LEFT, y + 18.0, table_width, 16.0, &entries);

    y = page.table(
        TABLE_LEFT,
        y + 20.0,
        &RECEIPT_COLUMNS,
        &breakdown_rows(&receipt.breakdown),
        RECEIPT_TABLE,
    );

    y += 26.0;
    page.aligned_text(
        TABLE_LEFT,
        table_width,
        y,
        11.0,
        Font::Bold,
        Align::Right,
        format!(
            "Reste à payer : {}",
            format_xof(receipt.breakdown.balance().max(0))
        ),
    );

    let signature_y = y + 50.0;
    page.aligned_text(
        TABLE_LEFT,
        table_width,
        signature_y,
        10.0,
        Font::Bold,
        Align::Right,
        "Le Caissier",
    );
    if let Some(cashier) = &receipt.cashier {
        page.aligned_text(
            TABLE_LEFT,
            table_width,
            signature_y + 14.0,
            10.0,
            Font::Regular,
            Align::Right,
            cashier.clone(),
        );
    }

    draw_footer(
        &mut page,
        "Ce reçu fait foi de paiement. Aucun remboursement n'est effectué après encaissement.",
    );
    page
}
