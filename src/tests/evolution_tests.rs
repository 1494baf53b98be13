//! tests/evolution_tests.rs
//! Parseo de respuestas de la Evolution API (v1 y v2).

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::models::contact_model::is_group_jid;
    use crate::services::evolution_service::{parse_contacts, parse_groups, parse_instances};

    #[test]
    fn test_contacts_exclude_groups_and_broadcasts() {
        let body = json!([
            { "remoteJid": "5491111111111@s.whatsapp.net", "pushName": "Ana", "profilePicUrl": null },
            { "remoteJid": "120363000000000000@g.us", "pushName": "Grupo" },
            { "remoteJid": "status@broadcast" },
            { "id": "5492222222222@s.whatsapp.net", "name": "Beto" },
            { "pushName": "sin id" }
        ]);

        let contacts = parse_contacts(&body);
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].id, "5491111111111@s.whatsapp.net");
        assert_eq!(contacts[0].name.as_deref(), Some("Ana"));
        assert_eq!(contacts[0].profile_pic_url, None);
        assert_eq!(contacts[1].name.as_deref(), Some("Beto"));
    }

    #[test]
    fn test_groups_only_keep_group_jids() {
        let body = json!({
            "data": [
                { "id": "120363000000000000@g.us", "subject": "Clientes", "size": 42, "desc": "VIP" },
                { "id": "5491111111111@s.whatsapp.net", "subject": "no es grupo" },
                { "id": "120363999999999999@g.us" }
            ]
        });

        let groups = parse_groups(&body);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].subject, "Clientes");
        assert_eq!(groups[0].size, Some(42));
        assert_eq!(groups[0].description.as_deref(), Some("VIP"));
        // Sin subject se usa el JID
        assert_eq!(groups[1].subject, "120363999999999999@g.us");
    }

    #[test]
    fn test_instances_v1_and_v2_shapes() {
        let body = json!([
            { "name": "ventas", "connectionStatus": "open", "ownerJid": "549@s.whatsapp.net", "profileName": "Ventas" },
            { "instance": { "instanceName": "soporte", "status": "close", "owner": "550@s.whatsapp.net" } },
            { "foo": "bar" }
        ]);

        let instances = parse_instances(&body);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].name, "ventas");
        assert_eq!(instances[0].connection_status.as_deref(), Some("open"));
        assert_eq!(instances[1].name, "soporte");
        assert_eq!(instances[1].connection_status.as_deref(), Some("close"));
        assert_eq!(instances[1].owner.as_deref(), Some("550@s.whatsapp.net"));
    }

    #[test]
    fn test_unexpected_body_yields_empty_lists() {
        let body = json!({ "error": "unauthorized" });
        assert!(parse_contacts(&body).is_empty());
        assert!(parse_groups(&body).is_empty());
        assert!(parse_instances(&body).is_empty());
    }

    #[test]
    fn test_group_jid_detection() {
        assert!(is_group_jid("120363000000000000@g.us"));
        assert!(!is_group_jid("5491111111111@s.whatsapp.net"));
    }
}
