use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::broadcast;

use super::message::Message;

/// 儲存庫變動通知，UI 層訂閱後再讀取最新快照。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Appended(String),
    Updated(String),
    Deleted(String),
    Responding(bool),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("message already exists: {0}")]
    DuplicateId(String),
    #[error("message not found: {0}")]
    UnknownId(String),
}

/// 對話狀態：依附加順序排列的訊息 ID、ID 對訊息的映射，以及是否正在回應。
///
/// 是否正在回應由進行中的回應數推得，數量大於零即為回應中。
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    message_ids: Vec<String>,
    messages: HashMap<String, Message>,
    responding: usize,
}

impl ConversationStore {
    /// 將新訊息加到尾端。ID 不得重複。
    pub fn append(&mut self, message: Message) -> Result<(), StoreError> {
        if self.messages.contains_key(&message.id) {
            return Err(StoreError::DuplicateId(message.id));
        }
        self.message_ids.push(message.id.clone());
        self.messages.insert(message.id.clone(), message);
        Ok(())
    }

    /// 以新內容取代既有訊息，並更新 `updated_at`。
    pub fn update(&mut self, mut message: Message) -> Result<(), StoreError> {
        let Some(slot) = self.messages.get_mut(&message.id) else {
            return Err(StoreError::UnknownId(message.id));
        };
        message.updated_at = Utc::now();
        *slot = message;
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<Message, StoreError> {
        let message = self
            .messages
            .remove(id)
            .ok_or_else(|| StoreError::UnknownId(id.to_string()))?;
        self.message_ids.retain(|existing| existing != id);
        Ok(message)
    }

    /// 直接設定回應旗標，會覆蓋進行中的回應數。
    pub fn set_responding(&mut self, responding: bool) {
        self.responding = usize::from(responding);
    }

    /// 登記一個開始中的回應。旗標由關轉開時回傳 `true`。
    pub fn begin_response(&mut self) -> bool {
        self.responding += 1;
        self.responding == 1
    }

    /// 登記一個結束的回應。最後一個回應結束時回傳 `true`。
    pub fn end_response(&mut self) -> bool {
        match self.responding {
            0 => false,
            count => {
                self.responding = count - 1;
                self.responding == 0
            }
        }
    }

    pub fn is_responding(&self) -> bool {
        self.responding > 0
    }

    pub fn message_ids(&self) -> &[String] {
        &self.message_ids
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    /// 依附加順序走訪所有訊息。
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.message_ids.iter().filter_map(|id| self.messages.get(id))
    }

    pub fn len(&self) -> usize {
        self.message_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.message_ids.is_empty()
    }
}

/// 可在驅動器與 UI 之間共享的對話儲存庫。
///
/// 每個操作都在同一把鎖內完成，讀取端不會看到只套用一半的變更。
/// 變更完成後再透過 broadcast channel 通知訂閱者。
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<ConversationStore>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(ConversationStore::default())),
            events,
        }
    }

    /// 訂閱變動通知。
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn append(&self, message: Message) -> Result<(), StoreError> {
        let id = message.id.clone();
        self.lock().append(message)?;
        self.notify(StoreEvent::Appended(id));
        Ok(())
    }

    pub fn update(&self, message: Message) -> Result<(), StoreError> {
        let id = message.id.clone();
        self.lock().update(message)?;
        self.notify(StoreEvent::Updated(id));
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<Message, StoreError> {
        let message = self.lock().delete(id)?;
        self.notify(StoreEvent::Deleted(id.to_string()));
        Ok(message)
    }

    pub fn set_responding(&self, responding: bool) {
        let mut store = self.lock();
        store.set_responding(responding);
        self.notify(StoreEvent::Responding(responding));
    }

    /// 開始一個回應。計數與通知都在同一把鎖內，併發的開始與結束不會互相覆蓋。
    pub fn begin_response(&self) {
        let mut store = self.lock();
        if store.begin_response() {
            self.notify(StoreEvent::Responding(true));
        }
    }

    pub fn end_response(&self) {
        let mut store = self.lock();
        if store.end_response() {
            self.notify(StoreEvent::Responding(false));
        }
    }

    pub fn is_responding(&self) -> bool {
        self.lock().is_responding()
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.lock().get(id).cloned()
    }

    /// 依附加順序複製所有訊息。
    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages().cloned().collect()
    }

    /// 取得整個儲存庫的一致快照。
    pub fn snapshot(&self) -> ConversationStore {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, ConversationStore> {
        // 每個操作都不會在持鎖時 panic，中毒時沿用內部狀態即可。
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, event: StoreEvent) {
        // 沒有訂閱者時傳送會失敗，這是正常情況。
        let _ = self.events.send(event);
    }
}
