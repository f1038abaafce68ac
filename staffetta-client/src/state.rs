use staffetta_core::{new_client_msg_id, ChatTarget, Group, GroupUpdate, Message, User};

/// Entry nella sequenza messaggi della conversazione aperta.
///
/// Un invio ottimistico parte come `Pending`, identificato dal clientMsgId
/// generato localmente, e viene rimpiazzato dall'eco autoritativa del server
/// (dalla risposta HTTP oppure dal fanout WS, quello che arriva prima:
/// mai entrambi).
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEntry {
    /// In attesa di conferma: al posto del timestamp c'è solo il marcatore.
    Pending {
        client_msg_id: String,
        content: String,
    },
    /// Confermato dal server.
    Confirmed(Message),
}

impl ChatEntry {
    pub fn is_pending(&self) -> bool {
        matches!(self, ChatEntry::Pending { .. })
    }

    pub fn content(&self) -> &str {
        match self {
            ChatEntry::Pending { content, .. } => content,
            ChatEntry::Confirmed(m) => &m.content,
        }
    }
}

/// Voce della lista conversazioni: una per controparte DM o gruppo.
///
/// È una vista materializzata su User/Group/Message, mai persistita:
/// viene ricalcolata ad ogni evento di messaggio o di membership.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationItem {
    pub target: ChatTarget,
    pub name: String,
    /// createdAt dell'ultimo messaggio, o createdAt dell'entità se non ce
    /// ne sono ancora. Unica chiave di ordinamento della lista.
    pub last_activity: String, // RFC3339 UTC
    /// Anteprima dell'ultimo messaggio.
    pub preview: Option<String>,
    /// Snapshot del gruppo (per i controlli riservati all'admin); None per i DM.
    pub group: Option<Group>,
}

impl ConversationItem {
    fn from_user(user: &User) -> Self {
        ConversationItem {
            target: ChatTarget::Direct(user.user_id.clone()),
            name: user.username.clone(),
            last_activity: user.created_at.clone(),
            preview: None,
            group: None,
        }
    }

    fn from_group(group: Group) -> Self {
        let (last_activity, preview) = match &group.latest_message {
            Some(m) => (m.created_at.clone(), Some(m.content.clone())),
            None => (group.created_at.clone(), None),
        };
        ConversationItem {
            target: ChatTarget::Group(group.group_id.clone()),
            name: group.name.clone(),
            last_activity,
            preview,
            group: Some(group),
        }
    }

    /// Id dell'entità (utente o gruppo), usato come tie-break deterministico.
    pub fn entity_id(&self) -> &str {
        self.target.chat_id()
    }
}

/// Stato di chat di un client autenticato.
pub struct ChatState {
    user_id: String,
    conversations: Vec<ConversationItem>,
    open: Option<ChatTarget>,
    entries: Vec<ChatEntry>,
}

impl ChatState {
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        ChatState {
            user_id: user_id.into(),
            conversations: Vec::new(),
            open: None,
            entries: Vec::new(),
        }
    }

    /// Carica la lista iniziale dalla risposta di GET /api/chats.
    pub fn seed(&mut self, users: &[User], groups: Vec<Group>) {
        self.conversations = groups
            .into_iter()
            .map(ConversationItem::from_group)
            .chain(users.iter().map(ConversationItem::from_user))
            .collect();
        self.resort();
    }

    pub fn conversations(&self) -> &[ConversationItem] {
        &self.conversations
    }

    pub fn conversation(&self, target: &ChatTarget) -> Option<&ConversationItem> {
        self.conversations.iter().find(|c| &c.target == target)
    }

    pub fn open_target(&self) -> Option<&ChatTarget> {
        self.open.as_ref()
    }

    /// Sequenza messaggi della conversazione aperta.
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Apre una conversazione con la storia scaricata dal server.
    pub fn open_conversation(&mut self, target: ChatTarget, history: Vec<Message>) {
        self.open = Some(target);
        self.entries = history.into_iter().map(ChatEntry::Confirmed).collect();
    }

    pub fn close_conversation(&mut self) {
        self.open = None;
        self.entries.clear();
    }

    /// Accoda subito un entry Pending alla conversazione aperta e ritorna il
    /// clientMsgId da correlare con l'invio vero e proprio. None se non c'è
    /// una conversazione aperta o il contenuto è vuoto.
    pub fn submit_optimistic(&mut self, content: &str) -> Option<String> {
        let content = content.trim();
        if content.is_empty() || self.open.is_none() {
            return None;
        }
        let client_msg_id = new_client_msg_id();
        self.entries.push(ChatEntry::Pending {
            client_msg_id: client_msg_id.clone(),
            content: content.to_string(),
        });
        Some(client_msg_id)
    }

    /// Riconcilia la risposta HTTP dell'invio con l'entry Pending.
    ///
    /// Se l'eco del fanout è già arrivata, il Pending viene scartato e vale
    /// l'eco (dedup per message id): mai due entry per lo stesso messaggio.
    pub fn confirm_send(&mut self, client_msg_id: &str, message: Message) {
        if self.contains_confirmed(&message.message_id) {
            self.entries.retain(|e| !matches_pending(e, client_msg_id));
        } else if let Some(idx) = self
            .entries
            .iter()
            .position(|e| matches_pending(e, client_msg_id))
        {
            self.entries[idx] = ChatEntry::Confirmed(message.clone());
        } else {
            self.entries.push(ChatEntry::Confirmed(message.clone()));
        }
        self.touch_conversation(&message);
    }

    /// Invio fallito: l'entry Pending sparisce, nessun retry automatico.
    /// Ritorna true se c'era davvero un Pending da rimuovere.
    pub fn fail_send(&mut self, client_msg_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !matches_pending(e, client_msg_id));
        self.entries.len() != before
    }

    /// Applica un evento messageReceived in arrivo dal fanout.
    pub fn apply_message(&mut self, message: &Message) {
        self.touch_conversation(message);

        if !self.is_relevant_to_open(message) {
            return;
        }

        if message.sender_id == self.user_id {
            // eco di un nostro invio: o è già stata riconciliata dalla
            // risposta HTTP, o consuma l'entry Pending più vecchia
            if self.contains_confirmed(&message.message_id) {
                return;
            }
            if let Some(idx) = self.entries.iter().position(|e| e.is_pending()) {
                self.entries[idx] = ChatEntry::Confirmed(message.clone());
            } else {
                self.entries.push(ChatEntry::Confirmed(message.clone()));
            }
        } else if !self.contains_confirmed(&message.message_id) {
            self.entries.push(ChatEntry::Confirmed(message.clone()));
        }
    }

    /// Applica un evento groupUpdated in arrivo dal fanout.
    ///
    /// Le varianti con lo snapshot rimpiazzano la voce di lista IN BLOCCO,
    /// mai campo per campo, così qualunque stato UI che guarda il vecchio
    /// Group (es. i controlli admin) si ricalcola. REMOVED elimina la voce
    /// e, se era la conversazione aperta, la chiude.
    pub fn apply_group_update(&mut self, update: GroupUpdate) {
        match update {
            GroupUpdate::New { group }
            | GroupUpdate::MemberAdded { group }
            | GroupUpdate::MemberRemoved { group } => {
                let item = ConversationItem::from_group(group);
                self.conversations.retain(|c| c.target != item.target);
                self.conversations.push(item);
                self.resort();
            }
            GroupUpdate::Removed { group_id } => {
                let target = ChatTarget::Group(group_id);
                self.conversations.retain(|c| c.target != target);
                if self.open.as_ref() == Some(&target) {
                    self.close_conversation();
                }
            }
        }
    }

    fn contains_confirmed(&self, message_id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, ChatEntry::Confirmed(m) if m.message_id == message_id))
    }

    /// La conversazione a cui appartiene il messaggio, dal punto di vista di
    /// QUESTO client: per i DM il chatId è la controparte solo se il
    /// mittente siamo noi, altrimenti è il mittente.
    fn conversation_target(&self, message: &Message) -> ChatTarget {
        match message.target() {
            ChatTarget::Group(group_id) => ChatTarget::Group(group_id),
            ChatTarget::Direct(chat_id) => {
                if message.sender_id == self.user_id {
                    ChatTarget::Direct(chat_id)
                } else {
                    ChatTarget::Direct(message.sender_id.clone())
                }
            }
        }
    }

    fn is_relevant_to_open(&self, message: &Message) -> bool {
        match &self.open {
            Some(open) => *open == self.conversation_target(message),
            None => false,
        }
    }

    /// Aggiorna attività e anteprima della voce di lista, poi riordina.
    /// Eventi per conversazioni non ancora in lista non creano voci: la
    /// lista nasce dal seed e dagli eventi NEW.
    fn touch_conversation(&mut self, message: &Message) {
        let target = self.conversation_target(message);
        let mut touched = false;
        if let Some(item) = self.conversations.iter_mut().find(|c| c.target == target) {
            item.last_activity = message.created_at.clone();
            item.preview = Some(message.content.clone());
            if let Some(group) = &mut item.group {
                group.latest_message = Some(message.clone());
            }
            touched = true;
        }
        if touched {
            self.resort();
        }
    }

    /// Ordine totale: attività recente prima, a parità di istante decide
    /// l'id dell'entità (deterministico per i test).
    fn resort(&mut self) {
        self.conversations.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| a.entity_id().cmp(b.entity_id()))
        });
    }
}

fn matches_pending(entry: &ChatEntry, id: &str) -> bool {
    matches!(entry, ChatEntry::Pending { client_msg_id, .. } if client_msg_id == id)
}
