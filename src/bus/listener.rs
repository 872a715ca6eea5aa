//! 监听表
//!
//! 地址到处理回调的映射，一次性安装到总线上。

use std::collections::HashMap;
use tracing::info;

use super::{BusChannel, MessageHandler, SubscriptionId};
use crate::error::{FlareError, Result};

/// 地址到处理回调的映射
#[derive(Default, Clone)]
pub struct ListenerTable {
    entries: Vec<(String, MessageHandler)>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一个监听；同一地址只能出现一次
    pub fn on(mut self, address: impl Into<String>, handler: MessageHandler) -> Result<Self> {
        let address = address.into();
        if address.is_empty() {
            return Err(FlareError::configuration_error("listener address is empty"));
        }
        if self.entries.iter().any(|(existing, _)| *existing == address) {
            return Err(FlareError::configuration_error(format!(
                "duplicate listener for address {}",
                address
            )));
        }
        self.entries.push((address, handler));
        Ok(self)
    }

    pub fn addresses(&self) -> Vec<&str> {
        self.entries.iter().map(|(address, _)| address.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 把全部监听订阅到总线上
    ///
    /// 任一订阅失败时撤销已完成的订阅并返回错误。
    pub async fn install(&self, bus: &dyn BusChannel) -> Result<HashMap<String, SubscriptionId>> {
        let mut installed = HashMap::with_capacity(self.entries.len());
        for (address, handler) in &self.entries {
            match bus.subscribe(address, handler.clone()).await {
                Ok(id) => {
                    installed.insert(address.clone(), id);
                }
                Err(err) => {
                    for id in installed.into_values() {
                        let _ = bus.unsubscribe(id).await;
                    }
                    return Err(err);
                }
            }
        }
        info!(listeners = installed.len(), "Listener table installed");
        Ok(installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusMessage, LocalBus};
    use serde_json::json;
    use std::sync::Arc;

    fn reply_with(value: &'static str) -> MessageHandler {
        Arc::new(move |message: BusMessage| {
            let _ = message.reply(json!(value));
        })
    }

    #[test]
    fn duplicate_address_is_rejected() {
        let table = ListenerTable::new().on("a", reply_with("a")).unwrap();
        assert!(table.on("a", reply_with("again")).is_err());
    }

    #[tokio::test]
    async fn install_subscribes_every_address() {
        let bus = LocalBus::default();
        let table = ListenerTable::new()
            .on("first", reply_with("one"))
            .unwrap()
            .on("second", reply_with("two"))
            .unwrap();
        assert_eq!(table.addresses(), vec!["first", "second"]);

        let installed = table.install(&bus).await.unwrap();
        assert_eq!(installed.len(), 2);
        assert_eq!(bus.request("first", json!({})).await.unwrap(), json!("one"));
        assert_eq!(bus.request("second", json!({})).await.unwrap(), json!("two"));
    }
}
