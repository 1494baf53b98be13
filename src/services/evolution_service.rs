//! services/evolution_service.rs
//! Cliente HTTP de la Evolution API: envíos de mensajes y consultas de
//! instancias, contactos y grupos.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::models::campaign_model::{CampaignContact, MessageBlock, MessageBlockType};
use crate::models::contact_model::{is_group_jid, Contact, Group, Instance, SendReceipt};
use crate::models::error_model::CampaignError;

/// Capacidad que usa el motor de campañas: "enviar este bloque a este
/// contacto por esta instancia".
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_block(
        &self,
        instance_name: &str,
        contact: &CampaignContact,
        block: &MessageBlock,
    ) -> Result<SendReceipt>;
}

#[derive(Clone)]
pub struct EvolutionService {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl EvolutionService {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// GET /instance/fetchInstances
    pub async fn list_instances(&self) -> Result<Vec<Instance>> {
        let url = format!("{}/instance/fetchInstances", self.base_url);
        log::info!("(list_instances) GET {}", url);
        let resp = self
            .http_client
            .get(&url)
            .header("apikey", &self.api_key)
            .send()
            .await
            .context("Fallo al hacer GET fetchInstances")?;
        let body = Self::read_json(resp, "fetchInstances").await?;
        Ok(parse_instances(&body))
    }

    /// Contactos individuales de la instancia (sin grupos ni broadcasts)
    pub async fn list_contacts(&self, instance_name: &str) -> Result<Vec<Contact>> {
        let url = format!("{}/chat/findContacts/{}", self.base_url, instance_name);
        log::info!("(list_contacts) POST {}", url);
        let resp = self
            .http_client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&json!({}))
            .send()
            .await
            .context("Fallo al hacer POST findContacts")?;
        let body = Self::read_json(resp, "findContacts").await?;
        Ok(parse_contacts(&body))
    }

    /// GET /group/fetchAllGroups/{instance}
    pub async fn list_groups(&self, instance_name: &str) -> Result<Vec<Group>> {
        let url = format!(
            "{}/group/fetchAllGroups/{}?getParticipants=false",
            self.base_url, instance_name
        );
        log::info!("(list_groups) GET {}", url);
        let resp = self
            .http_client
            .get(&url)
            .header("apikey", &self.api_key)
            .send()
            .await
            .context("Fallo al hacer GET fetchAllGroups")?;
        let body = Self::read_json(resp, "fetchAllGroups").await?;
        Ok(parse_groups(&body))
    }

    async fn read_json(resp: reqwest::Response, what: &str) -> Result<Value> {
        let status = resp.status();
        if !status.is_success() {
            let body_txt = resp.text().await.unwrap_or_default();
            log::error!("({}) Respuesta no exitosa [{}]: {}", what, status, body_txt);
            return Err(CampaignError::Upstream(format!("{} [{}]: {}", what, status, body_txt)).into());
        }
        resp.json::<Value>()
            .await
            .with_context(|| format!("Respuesta JSON inválida de {}", what))
    }
}

#[async_trait]
impl MessageSender for EvolutionService {
    async fn send_block(
        &self,
        instance_name: &str,
        contact: &CampaignContact,
        block: &MessageBlock,
    ) -> Result<SendReceipt> {
        let (url, payload) = match block.block_type {
            MessageBlockType::Text => (
                format!("{}/message/sendText/{}", self.base_url, instance_name),
                text_payload(contact, block),
            ),
            MessageBlockType::Media => (
                format!("{}/message/sendMedia/{}", self.base_url, instance_name),
                media_payload(contact, block),
            ),
        };

        let r = self
            .http_client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&payload)
            .send()
            .await
            .context("(send_block) Fallo al POST a Evolution API")?;

        log::debug!(
            "(send_block) -> Envío a '{}' por '{}': status={}",
            contact.phone,
            instance_name,
            r.status()
        );
        if !r.status().is_success() {
            let status = r.status();
            let e = r.text().await.unwrap_or_default();
            return Err(CampaignError::Upstream(format!("envío rechazado [{}]: {}", status, e)).into());
        }

        let body = r.json::<Value>().await.unwrap_or(Value::Null);
        Ok(SendReceipt {
            remote_message_id: remote_message_id(&body),
        })
    }
}

fn text_payload(contact: &CampaignContact, block: &MessageBlock) -> Value {
    json!({
        "number": contact.phone,
        "text": block.content,
    })
}

fn media_payload(contact: &CampaignContact, block: &MessageBlock) -> Value {
    let mut payload = json!({
        "number": contact.phone,
        "mediatype": block.media_type.as_deref().unwrap_or("image"),
        "caption": block.content,
        "media": block.media_url.as_deref().unwrap_or_default(),
    });
    if let Some(mime) = &block.mime_type {
        payload["mimetype"] = json!(mime);
    }
    if let Some(file_name) = &block.file_name {
        payload["fileName"] = json!(file_name);
    }
    payload
}

/// `{ "key": { "id": "..." } }`
fn remote_message_id(body: &Value) -> Option<String> {
    body["key"]["id"]
        .as_str()
        .or_else(|| body["messageId"].as_str())
        .map(str::to_string)
}

fn non_empty(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Acepta tanto un arreglo plano como `{ "data": [...] }`
fn as_items(body: &Value) -> &[Value] {
    body.as_array()
        .or_else(|| body["data"].as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// v2 usa `remoteJid`, v1 usa `id`
pub(crate) fn parse_contacts(body: &Value) -> Vec<Contact> {
    as_items(body)
        .iter()
        .filter_map(|item| {
            let id = non_empty(&item["remoteJid"]).or_else(|| non_empty(&item["id"]))?;
            if is_group_jid(&id) || id.ends_with("@broadcast") {
                return None;
            }
            Some(Contact {
                id,
                name: non_empty(&item["pushName"]).or_else(|| non_empty(&item["name"])),
                profile_pic_url: non_empty(&item["profilePicUrl"]),
            })
        })
        .collect()
}

pub(crate) fn parse_groups(body: &Value) -> Vec<Group> {
    as_items(body)
        .iter()
        .filter_map(|item| {
            let id = non_empty(&item["id"])?;
            if !is_group_jid(&id) {
                return None;
            }
            Some(Group {
                subject: non_empty(&item["subject"]).unwrap_or_else(|| id.clone()),
                size: item["size"].as_u64(),
                owner: non_empty(&item["owner"]),
                description: non_empty(&item["desc"]),
                id,
            })
        })
        .collect()
}

/// v2: `{ name, connectionStatus, ownerJid, profileName }`
/// v1: `{ instance: { instanceName, status, owner, profileName } }`
pub(crate) fn parse_instances(body: &Value) -> Vec<Instance> {
    as_items(body)
        .iter()
        .filter_map(|item| {
            let inner = if item["instance"].is_object() {
                &item["instance"]
            } else {
                item
            };
            let name = non_empty(&inner["name"]).or_else(|| non_empty(&inner["instanceName"]))?;
            Some(Instance {
                name,
                connection_status: non_empty(&inner["connectionStatus"])
                    .or_else(|| non_empty(&inner["status"])),
                owner: non_empty(&inner["ownerJid"]).or_else(|| non_empty(&inner["owner"])),
                profile_name: non_empty(&inner["profileName"]),
            })
        })
        .collect()
}
