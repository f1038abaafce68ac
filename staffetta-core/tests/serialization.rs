use staffetta_core::*;
use serde_json::{self as json, Value};

fn parse(json_str: &str) -> Value {
    json::from_str(json_str).expect("valid json")
}

fn sample_message() -> Message {
    Message {
        message_id: "33333333-3333-4333-8333-333333333333".to_string(),
        sender_id: "44444444-4444-4444-8444-444444444444".to_string(),
        chat_id: "22222222-2222-4222-8222-222222222222".to_string(),
        chat_type: ChatType::Group,
        content: "hello".to_string(),
        status: MessageStatus::Sent,
        created_at: "2025-11-02T10:20:35Z".to_string(),
    }
}

fn sample_group() -> Group {
    Group {
        group_id: "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa".to_string(),
        name: "general".to_string(),
        members: vec![
            "44444444-4444-4444-8444-444444444444".to_string(),
            "55555555-5555-4555-8555-555555555555".to_string(),
        ],
        admin_id: "44444444-4444-4444-8444-444444444444".to_string(),
        latest_message: None,
        created_at: "2025-11-02T10:00:00Z".to_string(),
    }
}

/*
    Obiettivo test: Verificare che un WsMessage::MessageReceived venga serializzato nel JSON atteso:
    ossia che abbia type "messageReceived" e il payload corretto con campi in camelCase
    (chatType "GROUP", status "sent").
    Verificare anche che lo stesso JSON sia deserializzabile di nuovo nello stesso valore Rust.
*/
#[test]
fn ws_message_received_roundtrip() {
    let m = sample_message();
    let msg = WsMessage::MessageReceived(m.clone());
    // serializzazione in una stringa json
    let s = json::to_string(&msg).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["type"], "messageReceived");
    assert_eq!(v["payload"]["messageId"], m.message_id);
    assert_eq!(v["payload"]["senderId"], m.sender_id);
    assert_eq!(v["payload"]["chatId"], m.chat_id);
    assert_eq!(v["payload"]["chatType"], "GROUP");
    assert_eq!(v["payload"]["status"], "sent");
    assert_eq!(v["payload"]["createdAt"], m.created_at);

    let back: WsMessage = json::from_str(&s).expect("deserialize");
    match back {
        WsMessage::MessageReceived(m_back) => assert_eq!(m_back, m),
        _ => panic!("expected MessageReceived"),
    }
}

/*
    Obiettivo test: Verificare che un WsMessage::GroupUpdated di tipo NEW abbia il payload
    nella forma { type: "NEW", group: {...} } con il gruppo completo in camelCase,
    e che il campo latestMessage venga omesso quando assente.
*/
#[test]
fn ws_group_updated_new_roundtrip() {
    let g = sample_group();
    let msg = WsMessage::GroupUpdated(GroupUpdate::New { group: g.clone() });

    let s = json::to_string(&msg).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["type"], "groupUpdated");
    assert_eq!(v["payload"]["type"], "NEW");
    assert_eq!(v["payload"]["group"]["groupId"], g.group_id);
    assert_eq!(v["payload"]["group"]["adminId"], g.admin_id);
    assert_eq!(v["payload"]["group"]["members"][0], g.members[0]);
    assert!(v["payload"]["group"]["latestMessage"].is_null());

    let back: WsMessage = json::from_str(&s).expect("deserialize");
    match back {
        WsMessage::GroupUpdated(GroupUpdate::New { group }) => assert_eq!(group, g),
        _ => panic!("expected GroupUpdated NEW"),
    }
}

/*
    Obiettivo test: Verificare che un WsMessage::GroupUpdated di tipo REMOVED porti SOLO
    l'id del gruppo ({ type: "REMOVED", groupId }), senza l'oggetto gruppo: chi è stato
    rimosso non deve più poter risolvere lo snapshot completo.
*/
#[test]
fn ws_group_updated_removed_carries_only_group_id() {
    let update = GroupUpdate::Removed {
        group_id: "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa".to_string(),
    };
    let msg = WsMessage::GroupUpdated(update.clone());

    let s = json::to_string(&msg).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["payload"]["type"], "REMOVED");
    assert_eq!(v["payload"]["groupId"], "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa");
    assert!(v["payload"]["group"].is_null());

    let back: WsMessage = json::from_str(&s).expect("deserialize");
    match back {
        WsMessage::GroupUpdated(u) => {
            assert_eq!(u, update);
            assert_eq!(u.group_id(), "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa");
        }
        _ => panic!("expected GroupUpdated"),
    }
}

/*
    Obiettivo test: Verificare che il gruppo serializzi il campo latestMessage quando la
    cache è popolata, con il messaggio annidato in camelCase.
*/
#[test]
fn group_serializes_latest_message_cache() {
    let mut g = sample_group();
    let m = sample_message();
    g.latest_message = Some(m.clone());

    let s = json::to_string(&g).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["latestMessage"]["messageId"], m.message_id);
    assert_eq!(v["latestMessage"]["content"], m.content);

    let back: Group = json::from_str(&s).expect("deserialize");
    assert_eq!(back, g);
}

/*
    Obiettivo test: Verificare che SendMessageRequest venga deserializzato dal JSON del
    client con i nomi campo in camelCase e il chatType enumerato ("DM" | "GROUP"),
    e che un chatType sconosciuto venga rifiutato.
*/
#[test]
fn http_send_message_request_parses_chat_type() {
    let s = r#"{"chatId":"22222222-2222-4222-8222-222222222222","chatType":"DM","content":"ciao"}"#;
    let req: SendMessageRequest = json::from_str(s).expect("deserialize");
    assert_eq!(req.chat_type, ChatType::Dm);
    assert_eq!(req.content, "ciao");

    let bad = r#"{"chatId":"x","chatType":"CHANNEL","content":"ciao"}"#;
    assert!(json::from_str::<SendMessageRequest>(bad).is_err());
}

/*
    Obiettivo test: Verificare la risoluzione della coppia ambigua (chatType, chatId) in
    ChatTarget al confine dell'API: per i DM il chatId è l'altro utente, per i gruppi è
    l'id del gruppo, e il roundtrip verso i valori wire è stabile.
*/
#[test]
fn chat_target_resolves_dual_purpose_chat_id() {
    let dm = ChatTarget::new(ChatType::Dm, "u-1".to_string());
    assert_eq!(dm, ChatTarget::Direct("u-1".to_string()));
    assert_eq!(dm.chat_type(), ChatType::Dm);
    assert_eq!(dm.chat_id(), "u-1");

    let grp = sample_message().target();
    assert_eq!(grp, ChatTarget::Group(sample_message().chat_id));
    assert_eq!(grp.chat_type().as_str(), "GROUP");
}

/*
    Obiettivo test: Verificare che la tassonomia ChatError produca il corpo wire atteso
    ({ code, message }) e che i codici siano stabili per ogni variante.
*/
#[test]
fn chat_error_maps_to_wire_body() {
    let e = ChatError::permission("only the group administrator can do this");
    let wire = e.to_wire();
    assert_eq!(wire.code, "forbidden");
    assert_eq!(wire.message, "only the group administrator can do this");

    assert_eq!(ChatError::validation("x").code(), "validation");
    assert_eq!(ChatError::conflict("x").code(), "conflict");
    assert_eq!(ChatError::not_found("x").code(), "not_found");
    assert_eq!(ChatError::invariant("x").code(), "invariant");
    assert_eq!(ChatError::store("x").code(), "store_error");
}

/*
    Obiettivo test: Verificare che Error venga serializzato nel JSON con i nomi campo
    giusti (camelCase) e che details venga omesso quando None.
*/
#[test]
fn ws_error_envelope_roundtrip() {
    let err = Error {
        code: "forbidden".to_string(),
        message: "not a member".to_string(),
        details: Some(json::json!({"groupId": "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa"})),
    };
    let msg = WsMessage::Error(err.clone());

    let s = json::to_string(&msg).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["type"], "error");
    assert_eq!(v["payload"]["code"], err.code);
    assert_eq!(v["payload"]["details"]["groupId"], "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa");

    let back: WsMessage = json::from_str(&s).expect("deserialize");
    match back {
        WsMessage::Error(err_back) => assert_eq!(err_back, err),
        _ => panic!("expected Error envelope"),
    }
}

/*
    Obiettivo test: Verificare che ListChatsResponse serializzi utenti e gruppi con i
    nomi campo camelCase, mantenendo l'ordine delle liste.
*/
#[test]
fn http_list_chats_response_roundtrip() {
    let user = User {
        user_id: "55555555-5555-4555-8555-555555555555".to_string(),
        username: "alice".to_string(),
        created_at: "2025-11-02T10:10:10Z".to_string(),
    };
    let resp = ListChatsResponse {
        users: vec![user.clone()],
        groups: vec![sample_group()],
    };

    let s = json::to_string(&resp).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["users"][0]["userId"], user.user_id);
    assert_eq!(v["groups"][0]["name"], "general");

    let back: ListChatsResponse = json::from_str(&s).expect("deserialize");
    assert_eq!(back.users, vec![user]);
}
