use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::layout::{Font, PageLayout};
use super::receipt::Letterhead;
use super::{draw_footer, draw_letterhead, french_date, RenderError};
use crate::tuition::domain::AcademicYear;

pub const CERTIFICATE_TITLE: &str = "CERTIFICAT DE FRÉQUENTATION";

const MARGIN: f32 = 60.0;

#[derive(Debug, Clone, Serialize)]
pub struct FrequencyCertificate {
    pub letterhead: Letterhead,
    pub certificate_number: String,
    pub issued_on: NaiveDate,
    pub issued_at: Option<String>,
    pub student_name: String,
    pub matricule: String,
    pub birth_date: Option<NaiveDate>,
    pub birth_place: Option<String>,
    pub class_name: String,
    pub academic_year: AcademicYear,
    pub signatory: String,
}

impl FrequencyCertificate {
    pub fn file_stem(&self) -> String {
        format!("certificat-frequentation-{}", self.matricule)
    }
}

/// JSON body of `POST /api/pdf/frequency-certificate`.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificateRequest {
    #[serde(default)]
    pub letterhead: Option<Letterhead>,
    #[serde(default)]
    pub certificate_number: Option<String>,
    #[serde(default)]
    pub issued_on: Option<NaiveDate>,
    #[serde(default)]
    pub issued_at: Option<String>,
    pub student_name: String,
    pub matricule: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub birth_place: Option<String>,
    pub class_name: String,
    /// Defaults to the school year containing the issue date.
    #[serde(default)]
    pub academic_year: Option<AcademicYear>,
    #[serde(default)]
    pub signatory: Option<String>,
}

impl CertificateRequest {
    pub fn into_certificate(
        self,
        default_letterhead: &Letterhead,
        today: NaiveDate,
    ) -> Result<FrequencyCertificate, RenderError> {
        for (field, value) in [
            ("student_name", &self.student_name),
            ("matricule", &self.matricule),
            ("class_name", &self.class_name),
        ] {
            if value.trim().is_empty() {
                return Err(RenderError::InvalidPayload(format!("{field} is required")));
            }
        }

        let issued_on = self.issued_on.unwrap_or(today);
        let certificate_number = self
            .certificate_number
            .filter(|number| !number.trim().is_empty())
            .unwrap_or_else(|| format!("CF-{}-{}", issued_on.format("%Y%m%d"), self.matricule));

        Ok(FrequencyCertificate {
            letterhead: self
                .letterhead
                .unwrap_or_else(|| default_letterhead.clone()),
            certificate_number,
            issued_on,
            issued_at: self.issued_at.filter(|place| !place.trim().is_empty()),
            student_name: self.student_name,
            matricule: self.matricule,
            birth_date: self.birth_date,
            birth_place: self.birth_place,
            class_name: self.class_name,
            academic_year: self
                .academic_year
                .unwrap_or_else(|| AcademicYear::containing(issued_on)),
            signatory: self
                .signatory
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "Le Directeur".to_string()),
        })
    }
}

pub fn certificate_layout(certificate: &FrequencyCertificate) -> PageLayout {
    let mut page = PageLayout::a4();
    let body_width = page.width - MARGIN * 2.0;
    let mut y = draw_letterhead(&mut page, &certificate.letterhead);

    y += 50.0;
    page.centered_text(y, 18.0, Font::Bold, CERTIFICATE_TITLE);
    let title_width = super::layout::text_width(CERTIFICATE_TITLE, 18.0, Font::Bold);
    let title_left = (page.width - title_width) / 2.0;
    page.line(title_left, y + 4.0, title_left + title_width, y + 4.0, 1.0);
    y += 20.0;
    page.centered_text(
        y,
        10.0,
        Font::Regular,
        format!("N° {}", certificate.certificate_number),
    );

    y += 40.0;
    y = page.paragraph(
        MARGIN,
        y,
        body_width,
        11.0,
        16.0,
        &format!(
            "Je soussigné(e), {}, certifie que l'élève dont l'identité suit :",
            certificate.signatory
        ),
    );

    let born = match (&certificate.birth_date, &certificate.birth_place) {
        (Some(date), Some(place)) => format!("{} à {}", french_date(*date), place),
        (Some(date), None) => french_date(*date),
        (None, Some(place)) => format!("à {place}"),
        (None, None) => "-".to_string(),
    };
    let entries = [
        ("Nom et prénoms", certificate.student_name.clone()),
        ("Matricule", certificate.matricule.clone()),
        ("Né(e) le", born),
        ("Classe", certificate.class_name.clone()),
        ("Année scolaire", certificate.academic_year.to_string()),
    ];
    y = page.info_box(MARGIN, y + 4.0, body_width, 18.0, &entries);

    y += 28.0;
    y = page.paragraph(
        MARGIN,
        y,
        body_width,
        11.0,
        16.0,
        &format!(
            "est régulièrement inscrit(e) et fréquente notre établissement en classe de {} \
             au titre de l'année scolaire {}.",
            certificate.class_name, certificate.academic_year
        ),
    );
    y += 8.0;
    y = page.paragraph(
        MARGIN,
        y,
        body_width,
        11.0,
        16.0,
        "En foi de quoi, le présent certificat lui est délivré pour servir et valoir ce que de droit.",
    );

    y += 40.0;
    let place = certificate
        .issued_at
        .as_ref()
        .map(|place| format!("Fait à {place}, le "))
        .unwrap_or_else(|| "Fait le ".to_string());
    let signature_left = page.width - MARGIN - 200.0;
    page.text(
        signature_left,
        y,
        11.0,
        Font::Regular,
        format!("{place}{}", french_date(certificate.issued_on)),
    );
    page.text(
        signature_left,
        y + 20.0,
        11.0,
        Font::Bold,
        certificate.signatory.clone(),
    );

    draw_footer(
        &mut page,
        "Certificat délivré sur demande de l'intéressé(e). Toute rature ou surcharge le rend nul.",
    );
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::layout::DrawOp;

    fn request() -> CertificateRequest {
        serde_json::from_value(serde_json::json!({
            "student_name": "KONÉ Ibrahim",
            "matricule": "MAT-042",
            "class_name": "6ème B",
            "birth_date": "2013-04-17",
            "birth_place": "Bouaké",
            "issued_at": "Abidjan"
        }))
        .expect("valid payload")
    }

    #[test]
    fn defaults_follow_issue_date() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 10).expect("valid");
        let certificate = request()
            .into_certificate(&Letterhead::named("Lycée Moderne"), today)
            .expect("certificate");

        assert_eq!(certificate.academic_year.to_string(), "2025-2026");
        assert_eq!(certificate.certificate_number, "CF-20260210-MAT-042");
        assert_eq!(certificate.signatory, "Le Directeur");
    }

    #[test]
    fn missing_identity_is_rejected() {
        let mut payload = request();
        payload.matricule = "  ".into();
        let today = NaiveDate::from_ymd_opt(2026, 2, 10).expect("valid");
        assert!(matches!(
            payload.into_certificate(&Letterhead::named("Lycée"), today),
            Err(RenderError::InvalidPayload(message)) if message.contains("matricule")
        ));
    }

    #[test]
    fn layout_carries_title_and_body_within_margins() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 10).expect("valid");
        let certificate = request()
            .into_certificate(&Letterhead::named("Lycée Moderne"), today)
            .expect("certificate");
        let page = certificate_layout(&certificate);

        let mut saw_title = false;
        for op in &page.ops {
            if let DrawOp::Text {
                x, size, font, text, ..
            } = op
            {
                saw_title |= text == CERTIFICATE_TITLE;
                let right = x + super::super::layout::text_width(text, *size, *font);
                assert!(right <= page.width - 39.0, "{text} overflows");
            }
        }
        assert!(saw_title);
    }
}
