//! models/contact_model.rs
//! Contactos, grupos e instancias tal como los expone la Evolution API.

use serde::{Deserialize, Serialize};

/// Sufijo de JID que identifica a un grupo
pub const GROUP_JID_SUFFIX: &str = "@g.us";

pub fn is_group_jid(jid: &str) -> bool {
    jid.ends_with(GROUP_JID_SUFFIX)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: Option<String>,
    pub profile_pic_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub subject: String,
    pub size: Option<u64>,
    pub owner: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    /// "open", "close", "connecting"...
    pub connection_status: Option<String>,
    pub owner: Option<String>,
    pub profile_name: Option<String>,
}

/// Respuesta exitosa de un envío
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub remote_message_id: Option<String>,
}
