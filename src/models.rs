use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============ Inbound Models ============

/// Body of `POST /api/cotizar`.
///
/// Every field is optional at the wire level so that missing required fields
/// surface as a 400 with our own message instead of a deserializer rejection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuoteRequest {
    pub placa: Option<String>,
    #[serde(rename = "documentType")]
    pub document_type: Option<String>,
    #[serde(rename = "documentNumber")]
    pub document_number: Option<String>,
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
}

/// A quote request whose mandatory fields are present.
#[derive(Debug, Clone)]
pub struct ValidQuoteRequest {
    /// Plate, uppercased.
    pub plate: String,
    pub document_type: String,
    pub document_number: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl QuoteRequest {
    /// Checks the mandatory fields. Blank values count as missing.
    pub fn validate(&self) -> Result<ValidQuoteRequest, AppError> {
        let (Some(plate), Some(document_type), Some(document_number)) = (
            non_blank(&self.placa),
            non_blank(&self.document_type),
            non_blank(&self.document_number),
        ) else {
            return Err(AppError::BadRequest(
                "Faltan datos requeridos: placa, documentType y documentNumber".to_string(),
            ));
        };

        Ok(ValidQuoteRequest {
            plate: plate.to_uppercase(),
            document_type: document_type.to_string(),
            document_number: document_number.to_string(),
            name: non_blank(&self.nombre).map(str::to_string),
            email: non_blank(&self.email).map(str::to_string),
            phone: non_blank(&self.telefono).map(str::to_string),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Maps a document type to the upstream's numeric `codTipdoc`.
///
/// CC → 1, CE → 2, NIT → 3, PA → 4; anything else falls back to 1.
pub fn document_type_code(document_type: &str) -> u8 {
    match document_type.trim().to_ascii_uppercase().as_str() {
        "CC" => 1,
        "CE" => 2,
        "NIT" => 3,
        "PA" => 4,
        _ => 1,
    }
}

/// Query parameters of the upstream `soat` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteParams {
    #[serde(rename = "numPlaca")]
    pub plate: String,
    #[serde(rename = "codProducto")]
    pub product_code: u32,
    #[serde(rename = "codTipdoc")]
    pub document_type_code: u8,
    #[serde(rename = "numDocumento")]
    pub document_number: String,
}

impl QuoteParams {
    pub fn new(request: &ValidQuoteRequest, product_code: u32) -> Self {
        Self {
            plate: request.plate.clone(),
            product_code,
            document_type_code: document_type_code(&request.document_type),
            document_number: request.document_number.clone(),
        }
    }

    /// Fixed sample used by the `/api/test` diagnostic.
    pub fn diagnostic_sample(product_code: u32) -> Self {
        Self {
            plate: "EDR63F".to_string(),
            product_code,
            document_type_code: 1,
            document_number: "123456".to_string(),
        }
    }
}

// ============ Normalized Quote ============

/// Vehicle attributes located in the upstream payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleInfo {
    #[serde(rename = "tipo")]
    pub vehicle_type: Value,
    #[serde(rename = "marca")]
    pub brand: Value,
    #[serde(rename = "modelo")]
    pub model: Value,
    #[serde(rename = "cilindraje")]
    pub displacement: Value,
}

/// Policy validity window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidityDates {
    #[serde(rename = "inicio")]
    pub start: Value,
    #[serde(rename = "fin")]
    pub end: Value,
}

/// Policy holder contact block. Request values win over upstream values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payer {
    #[serde(rename = "nombre")]
    pub name: Value,
    #[serde(rename = "documento")]
    pub document_number: String,
    #[serde(rename = "tipoDocumento")]
    pub document_type: String,
    pub email: Value,
    #[serde(rename = "telefono")]
    pub phone: Value,
}

/// Bank account accepted for the SOAT payment transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankAccount {
    #[serde(rename = "banco")]
    pub bank: &'static str,
    #[serde(rename = "numero")]
    pub number: &'static str,
    #[serde(rename = "tipo")]
    pub account_type: &'static str,
    #[serde(rename = "titular", skip_serializing_if = "Option::is_none")]
    pub holder: Option<&'static str>,
}

pub const BANK_ACCOUNTS: &[BankAccount] = &[
    BankAccount {
        bank: "Bancolombia",
        number: "30685175725",
        account_type: "Cuenta de Ahorros",
        holder: Some("Otto Rafael Badel"),
    },
    BankAccount {
        bank: "Nequi",
        number: "3128433999",
        account_type: "Cuenta Nequi",
        holder: None,
    },
];

pub const PAYMENT_INSTRUCTIONS: &[&str] = &[
    "Realiza la transferencia por el valor exacto",
    "Envía el comprobante dando clic al botón de WhatsApp: 3128433999",
    "Incluye la placa del vehículo",
    "Recibirás tu SOAT en 24 horas",
    "Horario de expedición - Lunes a Sábado: 9:00am - 6:00pm",
];

/// Response metadata.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteMetadata {
    pub timestamp: String,
    #[serde(rename = "numeroReferencia")]
    pub reference: String,
    #[serde(rename = "tokenType")]
    pub token_type: String,
    #[serde(rename = "tokenAge")]
    pub token_age: String,
}

/// Diagnostic echo of what the normalizer saw.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteDebug {
    #[serde(rename = "originalResponse")]
    pub original_response: Value,
    #[serde(rename = "extractedPrice")]
    pub extracted_price: f64,
    #[serde(rename = "vehicleInfo")]
    pub vehicle_info: VehicleInfo,
    #[serde(rename = "availableFields")]
    pub available_fields: Vec<String>,
    #[serde(rename = "responseType")]
    pub response_type: &'static str,
    /// Header strategy that got the successful answer.
    pub strategy: String,
}

/// Token state echoed on a failed quote. Never carries the token itself.
#[derive(Debug, Clone, Serialize)]
pub struct FailureTokenInfo {
    #[serde(rename = "hasToken")]
    pub has_token: bool,
    #[serde(rename = "tokenType")]
    pub token_type: String,
    #[serde(rename = "tokenAge")]
    pub token_age: String,
}

/// Diagnostic block attached to a failed `POST /api/cotizar`.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteFailureDebug {
    #[serde(rename = "tokenInfo")]
    pub token_info: FailureTokenInfo,
    pub url: String,
    pub params: Option<QuoteParams>,
}

/// Stable contract returned by `POST /api/cotizar`.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    pub success: bool,
    pub placa: String,
    pub precio: f64,
    #[serde(rename = "tipoVehiculo")]
    pub vehicle_type: Value,
    pub marca: Value,
    pub modelo: Value,
    pub cilindraje: Value,
    #[serde(rename = "inicioVigencia")]
    pub validity_start: Value,
    #[serde(rename = "finVigencia")]
    pub validity_end: Value,
    pub tomador: Payer,
    #[serde(rename = "cuentasBancarias")]
    pub bank_accounts: Vec<BankAccount>,
    #[serde(rename = "instruccionesPago")]
    pub payment_instructions: Vec<&'static str>,
    pub metadata: QuoteMetadata,
    pub debug: QuoteDebug,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(placa: Option<&str>, doc_type: Option<&str>, doc_number: Option<&str>) -> QuoteRequest {
        QuoteRequest {
            placa: placa.map(str::to_string),
            document_type: doc_type.map(str::to_string),
            document_number: doc_number.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_uppercases_plate() {
        let valid = request(Some("abc12d"), Some("CC"), Some("123")).validate().unwrap();
        assert_eq!(valid.plate, "ABC12D");
        assert_eq!(valid.document_type, "CC");
        assert!(valid.name.is_none());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        assert!(request(None, Some("CC"), Some("1")).validate().is_err());
        assert!(request(Some("ABC123"), None, Some("1")).validate().is_err());
        assert!(request(Some("ABC123"), Some("CC"), None).validate().is_err());
        assert!(request(Some("  "), Some("CC"), Some("1")).validate().is_err());
    }

    #[test]
    fn test_document_type_codes() {
        assert_eq!(document_type_code("CC"), 1);
        assert_eq!(document_type_code("CE"), 2);
        assert_eq!(document_type_code("NIT"), 3);
        assert_eq!(document_type_code("PA"), 4);
        assert_eq!(document_type_code("pa"), 4);
        assert_eq!(document_type_code("TI"), 1);
        assert_eq!(document_type_code(""), 1);
    }

    #[test]
    fn test_quote_params_serialize_with_upstream_names() {
        let valid = request(Some("xyz789"), Some("NIT"), Some("900123")).validate().unwrap();
        let params = serde_json::to_value(QuoteParams::new(&valid, 63)).unwrap();
        assert_eq!(
            params,
            serde_json::json!({
                "numPlaca": "XYZ789",
                "codProducto": 63,
                "codTipdoc": 3,
                "numDocumento": "900123"
            })
        );
    }

    #[test]
    fn test_bank_account_without_holder_omits_field() {
        let json = serde_json::to_value(&BANK_ACCOUNTS[1]).unwrap();
        assert!(json.get("titular").is_none());
        assert_eq!(json["banco"], "Nequi");
    }
}
