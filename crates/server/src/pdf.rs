//! Estimate and contract documents.
//!
//! Documents are rendered from Tera templates and converted with wkhtmltopdf
//! when the binary is on `PATH`. Without it the rendered HTML is returned so the
//! browser can print it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};

const ESTIMATE_TEMPLATE: &str = "estimate.html.tera";
const CONTRACT_TEMPLATE: &str = "contract.html.tera";

/// Register custom Tera filters used by document templates.
///
/// - `format`: printf-style formatting, e.g. `"%.1f" | format(value=line.discountRate)`
/// - `won`:    whole-won amount with thousands separators, e.g. `amount | won`
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("format", tera_format_filter);
    tera.register_filter("won", tera_won_filter);
}

/// Amounts arrive either as JSON numbers or as decimal strings.
fn decimal_of(value: &tera::Value) -> Decimal {
    match value {
        tera::Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain))
            .unwrap_or_default(),
        tera::Value::String(s) => Decimal::from_str(s.trim()).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

fn tera_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let format_str = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("format filter expects a string input"))?;

    let val = args
        .get("value")
        .ok_or_else(|| tera::Error::msg("format filter requires a 'value' argument"))?;
    let num = decimal_of(val).to_f64().unwrap_or(0.0);

    let result = match format_str.strip_prefix("%.").and_then(|rest| rest.strip_suffix('f')) {
        Some(precision) => format!("{:.*}", precision.parse().unwrap_or(2), num),
        None => format!("{num}"),
    };

    Ok(tera::Value::String(result))
}

fn tera_won_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let rounded = decimal_of(value).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    Ok(tera::Value::String(group_thousands(&rounded.trunc().to_string())))
}

fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}")
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("unsupported document type `{0}`")]
    UnsupportedDocument(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentType {
    Estimate,
    Contract,
}

impl DocumentType {
    fn template(&self) -> &'static str {
        match self {
            Self::Estimate => ESTIMATE_TEMPLATE,
            Self::Contract => CONTRACT_TEMPLATE,
        }
    }

    pub fn file_name(&self, doc_id: i64) -> String {
        match self {
            Self::Estimate => format!("estimate_{doc_id}.pdf"),
            Self::Contract => format!("contract_{doc_id}.pdf"),
        }
    }
}

impl FromStr for DocumentType {
    type Err = PdfError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "estimate" => Ok(Self::Estimate),
            "contract" => Ok(Self::Contract),
            other => Err(PdfError::UnsupportedDocument(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub include_logo: bool,
    pub include_signature: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { include_logo: true, include_signature: true }
    }
}

#[derive(Clone, Debug)]
pub struct DocumentRenderer {
    tera: Tera,
    assets_dir: Option<PathBuf>,
    wkhtmltopdf_path: Option<String>,
}

impl DocumentRenderer {
    /// Loads `*.tera` files from `template_dir` when given, the embedded
    /// templates otherwise. Logo and signature images are looked up in
    /// `template_dir/static`.
    pub fn new(template_dir: Option<&Path>) -> Result<Self, PdfError> {
        let tera = match template_dir {
            Some(dir) => match Self::load_dir(dir) {
                Ok(tera) => {
                    info!(template_dir = %dir.display(), "document templates loaded from filesystem");
                    tera
                }
                Err(e) => {
                    warn!(error = %e, "failed to load filesystem templates, using embedded fallback");
                    Self::embedded()?
                }
            },
            None => Self::embedded()?,
        };

        let wkhtmltopdf_path =
            which::which("wkhtmltopdf").ok().map(|p| p.to_string_lossy().to_string());
        match wkhtmltopdf_path.as_deref() {
            Some(path) => info!(path = %path, "wkhtmltopdf found"),
            None => warn!("wkhtmltopdf not found in PATH - documents will be served as printable HTML"),
        }

        Ok(Self {
            tera,
            assets_dir: template_dir.map(|dir| dir.join("static")),
            wkhtmltopdf_path,
        })
    }

    fn load_dir(dir: &Path) -> Result<Tera, PdfError> {
        let mut tera = Tera::new(&format!("{}/**/*.tera", dir.display()))
            .map_err(|e| PdfError::Template(e.to_string()))?;
        tera.autoescape_on(vec![".html.tera"]);
        register_template_filters(&mut tera);
        for required in [ESTIMATE_TEMPLATE, CONTRACT_TEMPLATE] {
            if !tera.get_template_names().any(|name| name == required) {
                return Err(PdfError::Template(format!("missing template {required}")));
            }
        }
        Ok(tera)
    }

    fn embedded() -> Result<Tera, PdfError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html.tera"]);
        register_template_filters(&mut tera);
        tera.add_raw_templates(vec![
            (ESTIMATE_TEMPLATE, include_str!("../../../templates/documents/estimate.html.tera")),
            (CONTRACT_TEMPLATE, include_str!("../../../templates/documents/contract.html.tera")),
        ])
        .map_err(|e| PdfError::Template(e.to_string()))?;
        Ok(tera)
    }

    #[cfg(test)]
    pub fn force_html(&mut self) {
        self.wkhtmltopdf_path = None;
    }

    pub fn render_html<T: Serialize>(
        &self,
        doc_type: DocumentType,
        document: &T,
        options: RenderOptions,
    ) -> Result<String, PdfError> {
        let mut context = Context::new();
        context.insert("doc", document);
        context.insert("include_logo", &options.include_logo);
        context.insert("include_signature", &options.include_signature);
        context.insert("logo_path", &self.asset_url("logo.png"));
        context.insert("sign_path", &self.asset_url("sign.png"));

        self.tera
            .render(doc_type.template(), &context)
            .map_err(|e| PdfError::Template(format!("{e:?}")))
    }

    /// Renders the document and converts it to PDF when possible.
    pub async fn render<T: Serialize>(
        &self,
        doc_type: DocumentType,
        document: &T,
        options: RenderOptions,
    ) -> Result<PdfResult, PdfError> {
        let html = self.render_html(doc_type, document, options)?;

        let Some(wkhtmltopdf) = self.wkhtmltopdf_path.as_deref() else {
            return Ok(PdfResult::Html(html));
        };
        match convert_html_to_pdf(&html, wkhtmltopdf).await {
            Ok(pdf_bytes) => Ok(PdfResult::Pdf(pdf_bytes)),
            Err(e) => {
                warn!(error = %e, "PDF conversion failed, falling back to HTML");
                Ok(PdfResult::Html(html))
            }
        }
    }

    fn asset_url(&self, file: &str) -> Option<String> {
        self.assets_dir
            .as_ref()
            .map(|dir| dir.join(file))
            .filter(|path| path.exists())
            .map(|path| format!("file://{}", path.display()))
    }
}

async fn convert_html_to_pdf(html: &str, wkhtmltopdf_path: &str) -> Result<Vec<u8>, PdfError> {
    let temp_dir = std::env::temp_dir();
    let stem = uuid::Uuid::new_v4();
    let html_path = temp_dir.join(format!("document_{stem}.html"));
    let pdf_path = temp_dir.join(format!("document_{stem}.pdf"));

    tokio::fs::write(&html_path, html).await?;

    let output = Command::new(wkhtmltopdf_path)
        .args(["--page-size", "A4"])
        .args(["--margin-top", "10mm", "--margin-bottom", "10mm"])
        .args(["--margin-left", "10mm", "--margin-right", "10mm"])
        .args(["--encoding", "utf-8"])
        .arg("--enable-local-file-access")
        .arg(&html_path)
        .arg(&pdf_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let result = match output {
        Ok(output) if output.status.success() => tokio::fs::read(&pdf_path).await.map_err(PdfError::from),
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!(stderr = %stderr, "wkhtmltopdf failed");
            Err(PdfError::Conversion(stderr))
        }
        Err(e) => Err(PdfError::Io(e)),
    };

    let _ = tokio::fs::remove_file(&html_path).await;
    let _ = tokio::fs::remove_file(&pdf_path).await;

    if let Ok(bytes) = &result {
        info!(size = bytes.len(), "PDF generated successfully");
    }
    result
}

pub enum PdfResult {
    Pdf(Vec<u8>),
    Html(String),
}

impl PdfResult {
    pub fn into_response(self, filename: &str) -> Response {
        match self {
            PdfResult::Pdf(bytes) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
                    (header::CONTENT_DISPOSITION, attachment_disposition(filename)),
                ],
                bytes,
            )
                .into_response(),
            PdfResult::Html(html) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
                html,
            )
                .into_response(),
        }
    }
}

/// `attachment` disposition with an ASCII fallback name and the RFC 5987
/// `filename*` form for everything else (Hangul file names in particular).
pub fn attachment_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|ch| if ch.is_ascii_graphic() && ch != '"' && ch != '\\' { ch } else { '_' })
        .collect();
    let mut encoded = String::with_capacity(filename.len() * 3);
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    HeaderValue::from_str(&format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}"))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn renderer() -> DocumentRenderer {
        let mut renderer = DocumentRenderer::new(None).expect("embedded templates");
        renderer.force_html();
        renderer
    }

    #[test]
    fn won_filter_groups_thousands_for_numbers_and_decimal_strings() {
        let args = HashMap::new();
        let from_string = tera_won_filter(&json!("1234567.50"), &args).expect("filter");
        assert_eq!(from_string, json!("1,234,568"));
        let from_number = tera_won_filter(&json!(1000), &args).expect("filter");
        assert_eq!(from_number, json!("1,000"));
        assert_eq!(group_thousands("-999"), "-999");
    }

    #[test]
    fn document_type_rejects_unknown_kinds() {
        assert_eq!("Estimate".parse::<DocumentType>().expect("estimate"), DocumentType::Estimate);
        assert!(matches!(
            "invoice".parse::<DocumentType>(),
            Err(PdfError::UnsupportedDocument(kind)) if kind == "invoice"
        ));
    }

    #[tokio::test]
    async fn estimate_renders_as_html_without_wkhtmltopdf() {
        let document = json!({
            "estimateId": 1,
            "quoteId": "ITS-20260105-001",
            "quoteTitle": "방화벽 도입 견적",
            "customerNm": "Test Customer",
            "totalPriceBeforeVat": "1000000",
            "vat": "100000",
            "totalPriceWithVat": "1100000",
            "products": [{
                "productName": "NGFW-500",
                "quantity": 2,
                "unitPrice": "500000",
                "discountRate": "0",
                "finalPrice": "1000000"
            }]
        });

        let result = renderer()
            .render(DocumentType::Estimate, &document, RenderOptions::default())
            .await
            .expect("render");
        let PdfResult::Html(html) = result else { panic!("expected HTML without wkhtmltopdf") };
        assert!(html.contains("ITS-20260105-001"));
        assert!(html.contains("Test Customer"));
        assert!(html.contains("1,100,000"));
    }

    #[test]
    fn signature_block_follows_render_options() {
        let document = json!({
            "contractId": 3,
            "contractNo": "CTR-20260105-001",
            "contractName": "유지보수 계약",
            "amount": "300000",
            "tax": "30000",
            "totalAmount": "330000",
            "products": []
        });
        let renderer = renderer();
        let signed = renderer
            .render_html(DocumentType::Contract, &document, RenderOptions::default())
            .expect("render");
        let unsigned = renderer
            .render_html(
                DocumentType::Contract,
                &document,
                RenderOptions { include_logo: false, include_signature: false },
            )
            .expect("render");
        assert!(signed.contains("class=\"signature-block\""));
        assert!(!unsigned.contains("class=\"signature-block\""));
    }

    #[test]
    fn disposition_encodes_non_ascii_names() {
        let value = attachment_disposition("견적서 1.pdf");
        let text = value.to_str().expect("ascii header");
        assert!(text.starts_with("attachment; filename=\""));
        assert!(text.contains("filename*=UTF-8''%EA%B2%AC"));
        assert!(text.contains("%201.pdf"));
    }
}
