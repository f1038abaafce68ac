use staffetta_client::{ChatEntry, ChatState};
use staffetta_core::{ChatTarget, ChatType, Group, GroupUpdate, Message, MessageStatus, User};

const ME: &str = "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa";
const BOB: &str = "bbbbbbbb-bbbb-4bbb-8bbb-bbbbbbbbbbbb";
const CAROL: &str = "cccccccc-cccc-4ccc-8ccc-cccccccccccc";
const GROUP_ID: &str = "dddddddd-dddd-4ddd-8ddd-dddddddddddd";

fn user(user_id: &str, username: &str, created_at: &str) -> User {
    User {
        user_id: user_id.to_string(),
        username: username.to_string(),
        created_at: created_at.to_string(),
    }
}

fn group(group_id: &str, name: &str, members: &[&str], admin_id: &str, created_at: &str) -> Group {
    Group {
        group_id: group_id.to_string(),
        name: name.to_string(),
        members: members.iter().map(|m| m.to_string()).collect(),
        admin_id: admin_id.to_string(),
        latest_message: None,
        created_at: created_at.to_string(),
    }
}

fn msg(
    message_id: &str,
    sender_id: &str,
    chat_id: &str,
    chat_type: ChatType,
    content: &str,
    created_at: &str,
) -> Message {
    Message {
        message_id: message_id.to_string(),
        sender_id: sender_id.to_string(),
        chat_id: chat_id.to_string(),
        chat_type,
        content: content.to_string(),
        status: MessageStatus::Sent,
        created_at: created_at.to_string(),
    }
}

/// Stato con un DM aperto verso Bob e la lista già popolata.
fn state_with_open_dm() -> ChatState {
    let mut state = ChatState::new(ME);
    state.seed(
        &[
            user(BOB, "bob", "2025-11-02T09:00:00Z"),
            user(CAROL, "carol", "2025-11-02T09:00:01Z"),
        ],
        vec![],
    );
    state.open_conversation(ChatTarget::Direct(BOB.to_string()), vec![]);
    state
}

/*
    Obiettivo test: un invio ottimistico accoda subito un entry Pending con il
    clientMsgId generato, e la conferma HTTP lo rimpiazza SUL POSTO con il
    messaggio autoritativo, preservando la posizione nella sequenza.
*/
#[test]
fn optimistic_send_confirms_in_place() {
    let mut state = state_with_open_dm();

    let client_msg_id = state.submit_optimistic("ciao bob").expect("pending id");
    assert_eq!(state.entries().len(), 1);
    assert!(state.entries()[0].is_pending());
    assert_eq!(state.entries()[0].content(), "ciao bob");

    let echo = msg("m-1", ME, BOB, ChatType::Dm, "ciao bob", "2025-11-02T10:00:00Z");
    state.confirm_send(&client_msg_id, echo.clone());

    assert_eq!(state.entries().len(), 1);
    assert_eq!(state.entries()[0], ChatEntry::Confirmed(echo));
}

/*
    Obiettivo test: se l'eco del fanout arriva PRIMA della risposta HTTP, il
    Pending viene consumato dall'eco e la conferma successiva non deve creare
    un duplicato: mai due entry per lo stesso message id.
*/
#[test]
fn echo_before_confirm_never_duplicates() {
    let mut state = state_with_open_dm();

    let client_msg_id = state.submit_optimistic("ciao bob").expect("pending id");
    let echo = msg("m-1", ME, BOB, ChatType::Dm, "ciao bob", "2025-11-02T10:00:00Z");

    // fanout prima...
    state.apply_message(&echo);
    assert_eq!(state.entries().len(), 1);
    assert!(!state.entries()[0].is_pending());

    // ...poi la risposta HTTP con lo stesso messaggio
    state.confirm_send(&client_msg_id, echo.clone());
    assert_eq!(state.entries().len(), 1);
    assert_eq!(state.entries()[0], ChatEntry::Confirmed(echo));
}

/*
    Obiettivo test: un invio fallito rimuove l'entry Pending e non lascia
    traccia nella sequenza (nessun retry automatico).
*/
#[test]
fn failed_send_rolls_back_pending_entry() {
    let mut state = state_with_open_dm();

    let client_msg_id = state.submit_optimistic("ciao bob").expect("pending id");
    assert_eq!(state.entries().len(), 1);

    assert!(state.fail_send(&client_msg_id));
    assert!(state.entries().is_empty());
    // un secondo tentativo di rollback non trova più niente
    assert!(!state.fail_send(&client_msg_id));
}

/*
    Obiettivo test (idempotenza della dedup): consegnare due volte lo stesso
    messageReceived alla cache produce UNA sola entry nella sequenza.
*/
#[test]
fn duplicate_delivery_is_deduped_by_id() {
    let mut state = state_with_open_dm();

    let incoming = msg("m-7", BOB, ME, ChatType::Dm, "ehi", "2025-11-02T10:00:00Z");
    state.apply_message(&incoming);
    state.apply_message(&incoming);

    assert_eq!(state.entries().len(), 1);
    assert_eq!(state.entries()[0], ChatEntry::Confirmed(incoming));
}

/*
    Obiettivo test: con due invii in volo, eco e conferme possono arrivare in
    qualunque ordine ma alla fine la sequenza contiene esattamente i due
    messaggi confermati, senza Pending residui né duplicati.
*/
#[test]
fn interleaved_echo_and_confirm_with_two_in_flight() {
    let mut state = state_with_open_dm();

    let id_a = state.submit_optimistic("primo").expect("pending id");
    let id_b = state.submit_optimistic("secondo").expect("pending id");
    assert_eq!(state.entries().len(), 2);

    let msg_a = msg("m-a", ME, BOB, ChatType::Dm, "primo", "2025-11-02T10:00:00Z");
    let msg_b = msg("m-b", ME, BOB, ChatType::Dm, "secondo", "2025-11-02T10:00:01Z");

    // l'eco del secondo invio arriva prima di tutto il resto
    state.apply_message(&msg_b);
    state.confirm_send(&id_b, msg_b.clone());
    state.confirm_send(&id_a, msg_a.clone());
    state.apply_message(&msg_a);

    let confirmed: Vec<&Message> = state
        .entries()
        .iter()
        .filter_map(|e| match e {
            ChatEntry::Confirmed(m) => Some(m),
            ChatEntry::Pending { .. } => None,
        })
        .collect();
    assert_eq!(confirmed.len(), 2);
    assert_eq!(state.entries().len(), 2);
    assert!(confirmed.iter().any(|m| m.message_id == "m-a"));
    assert!(confirmed.iter().any(|m| m.message_id == "m-b"));
}

/*
    Obiettivo test (ordinamento lista): con attività [t1=5, t2=9, t3=9] le due
    voci in parità (t2, t3) stanno prima di t1 e il loro ordine relativo è
    deterministico per id dell'entità.
*/
#[test]
fn conversation_list_orders_by_activity_then_entity_id() {
    let mut state = ChatState::new(ME);
    state.seed(
        &[
            user(BOB, "bob", "2025-11-02T10:00:05Z"),   // t1 = 5
            user(CAROL, "carol", "2025-11-02T10:00:09Z"), // t2 = 9
        ],
        vec![group(
            GROUP_ID,
            "Team",
            &[ME, BOB, CAROL],
            ME,
            "2025-11-02T10:00:09Z", // t3 = 9, in parità con t2
        )],
    );

    let order: Vec<&str> = state
        .conversations()
        .iter()
        .map(|c| c.entity_id())
        .collect();
    // CAROL (cccc...) < GROUP_ID (dddd...) come id: a parità di istante vince l'id minore
    assert_eq!(order, vec![CAROL, GROUP_ID, BOB]);
}

/*
    Obiettivo test: un messaggio in arrivo aggiorna attività e anteprima della
    conversazione giusta e la porta in testa alla lista riordinata. Per i DM
    in ricezione la conversazione è quella del MITTENTE (il chatId è il nostro id).
*/
#[test]
fn inbound_message_resorts_conversation_list() {
    let mut state = ChatState::new(ME);
    state.seed(
        &[
            user(BOB, "bob", "2025-11-02T09:00:00Z"),
            user(CAROL, "carol", "2025-11-02T09:30:00Z"),
        ],
        vec![],
    );
    // carol è più recente, quindi parte davanti
    assert_eq!(state.conversations()[0].entity_id(), CAROL);

    let incoming = msg("m-9", BOB, ME, ChatType::Dm, "sveglia!", "2025-11-02T11:00:00Z");
    state.apply_message(&incoming);

    let bob_item = &state.conversations()[0];
    assert_eq!(bob_item.entity_id(), BOB);
    assert_eq!(bob_item.last_activity, "2025-11-02T11:00:00Z");
    assert_eq!(bob_item.preview.as_deref(), Some("sveglia!"));
}

/*
    Obiettivo test: un groupUpdated con snapshot rimpiazza la voce di lista IN
    BLOCCO: dopo un MEMBER_REMOVED lo snapshot del gruppo nella voce non
    contiene più il membro uscito e il nome/est. admin sono quelli nuovi.
*/
#[test]
fn group_update_replaces_item_wholesale() {
    let mut state = ChatState::new(ME);
    state.seed(
        &[user(BOB, "bob", "2025-11-02T09:00:00Z")],
        vec![group(GROUP_ID, "Team", &[ME, BOB, CAROL], ME, "2025-11-02T10:00:00Z")],
    );

    let updated = group(GROUP_ID, "Team", &[ME, CAROL], ME, "2025-11-02T10:00:00Z");
    state.apply_group_update(GroupUpdate::MemberRemoved {
        group: updated.clone(),
    });

    let item = state
        .conversation(&ChatTarget::Group(GROUP_ID.to_string()))
        .expect("group still listed");
    let snapshot = item.group.as_ref().expect("group snapshot");
    assert_eq!(snapshot, &updated);
    assert!(!snapshot.members.iter().any(|m| m == BOB));
}

/*
    Obiettivo test: un NEW per un gruppo sconosciuto inserisce la voce in
    lista (è così che il creatore e i membri invitati la vedono comparire).
*/
#[test]
fn new_group_event_inserts_conversation() {
    let mut state = ChatState::new(ME);
    state.seed(&[user(BOB, "bob", "2025-11-02T09:00:00Z")], vec![]);
    assert_eq!(state.conversations().len(), 1);

    let g = group(GROUP_ID, "Team", &[ME, BOB], ME, "2025-11-02T12:00:00Z");
    state.apply_group_update(GroupUpdate::New { group: g });

    assert_eq!(state.conversations().len(), 2);
    // appena creato, è l'attività più recente
    assert_eq!(state.conversations()[0].entity_id(), GROUP_ID);
    assert_eq!(state.conversations()[0].preview, None);
}

/*
    Obiettivo test: su REMOVED riferito a noi la conversazione sparisce dalla
    lista e, se era quella aperta, viene chiusa e svuotata.
*/
#[test]
fn removed_event_evicts_and_closes_open_conversation() {
    let mut state = ChatState::new(ME);
    state.seed(
        &[user(BOB, "bob", "2025-11-02T09:00:00Z")],
        vec![group(GROUP_ID, "Team", &[ME, BOB], BOB, "2025-11-02T10:00:00Z")],
    );
    let target = ChatTarget::Group(GROUP_ID.to_string());
    state.open_conversation(
        target.clone(),
        vec![msg("m-1", BOB, GROUP_ID, ChatType::Group, "ciao", "2025-11-02T10:30:00Z")],
    );
    assert_eq!(state.entries().len(), 1);

    state.apply_group_update(GroupUpdate::Removed {
        group_id: GROUP_ID.to_string(),
    });

    assert!(state.conversation(&target).is_none());
    assert!(state.open_target().is_none());
    assert!(state.entries().is_empty());
}

/*
    Obiettivo test: l'eco di un nostro messaggio ricevuta su un ALTRO
    dispositivo (nessun Pending locale) viene semplicemente accodata una
    volta sola.
*/
#[test]
fn echo_on_other_device_appends_once() {
    let mut state = state_with_open_dm();

    let echo = msg("m-1", ME, BOB, ChatType::Dm, "da altrove", "2025-11-02T10:00:00Z");
    state.apply_message(&echo);
    state.apply_message(&echo);

    assert_eq!(state.entries().len(), 1);
    assert_eq!(state.entries()[0], ChatEntry::Confirmed(echo));
}

/*
    Obiettivo test: un messaggio per un'ALTRA conversazione non tocca la
    sequenza aperta ma aggiorna comunque la voce di lista interessata.
*/
#[test]
fn message_for_other_conversation_updates_list_only() {
    let mut state = state_with_open_dm(); // aperto il DM con Bob

    let from_carol = msg("m-3", CAROL, ME, ChatType::Dm, "ci sei?", "2025-11-02T11:00:00Z");
    state.apply_message(&from_carol);

    assert!(state.entries().is_empty());
    let carol_item = state
        .conversation(&ChatTarget::Direct(CAROL.to_string()))
        .expect("carol listed");
    assert_eq!(carol_item.preview.as_deref(), Some("ci sei?"));
    assert_eq!(state.conversations()[0].entity_id(), CAROL);
}
