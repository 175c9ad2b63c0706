use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::config;

/// Result of scanning a supplier invoice photo. The endpoint contract is the
/// multi-item shape: every detected line item, plus the supplier when the
/// invoice names one.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub items: Vec<ScannedItem>,
    pub supplier: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Option<i64>,
    pub category: Option<String>,
}

#[derive(Debug, Display, From)]
pub enum Error {
    /// No `[inference]` section in the configuration.
    #[display("invoice scanner is not configured")]
    NotConfigured,

    #[display("invoice scan failed: {_0}")]
    #[from]
    Http(reqwest::Error),
}

/// Extracts restockable line items from an invoice photo via the external
/// vision endpoint. Unlike triage there is no local fallback: failures are
/// surfaced to the acting staff member.
pub struct Scanner {
    http: reqwest::Client,
    config: Option<config::Inference>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Request<'a> {
    image_base64: &'a str,
    mime_type: &'a str,
}

// Wire field names follow the inference endpoint's extraction schema.
#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    items: Vec<ResponseItem>,
    supplier: Option<String>,
}

#[derive(Deserialize)]
struct ResponseItem {
    nama_barang: String,
    #[serde(default = "default_quantity")]
    qty: u32,
    harga_beli_satuan: Option<i64>,
    kategori: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl Scanner {
    pub fn new(config: Option<config::Inference>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn scan(
        &self,
        image_base64: &str,
        mime_type: &str,
    ) -> Result<Scan, Error> {
        let config = self.config.as_ref().ok_or(Error::NotConfigured)?;

        let response = self
            .http
            .post(&config.invoice_url)
            .bearer_auth(&config.api_key)
            .timeout(config.timeout)
            .json(&Request {
                image_base64,
                mime_type,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<Response>()
            .await?;

        Ok(Scan {
            items: response
                .items
                .into_iter()
                .map(|item| ScannedItem {
                    name: item.nama_barang,
                    quantity: item.qty,
                    unit_price: item.harga_beli_satuan,
                    category: item.kategori,
                })
                .collect(),
            supplier: response.supplier,
        })
    }
}
