//! Filter graph: the constructed filters in construction order

use log::debug;

use super::filter::{Filter, FilterRole};
use super::host::{FilterHost, HostId};

/// A constructed filter together with its host
pub struct FilterEntry {
    pub filter: Filter,
    pub host: FilterHost,
}

/// Ordered, role-unique collection of constructed filters.
///
/// The graph exclusively owns every filter and host pair; hosts only point
/// back at the shared state and the controller channel.
#[derive(Default)]
pub struct FilterGraph {
    entries: Vec<FilterEntry>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter; refused if its role is already present
    pub fn push(&mut self, filter: Filter, host: FilterHost) -> Result<(), (Filter, FilterHost)> {
        if self.contains(filter.role()) {
            return Err((filter, host));
        }
        self.entries.push(FilterEntry { filter, host });
        Ok(())
    }

    pub fn contains(&self, role: FilterRole) -> bool {
        self.entries.iter().any(|e| e.filter.role() == role)
    }

    pub fn get(&self, role: FilterRole) -> Option<&FilterEntry> {
        self.entries.iter().find(|e| e.filter.role() == role)
    }

    pub fn get_mut(&mut self, role: FilterRole) -> Option<&mut FilterEntry> {
        self.entries.iter_mut().find(|e| e.filter.role() == role)
    }

    /// Find the live entry owning host `id`
    pub fn find_host(&self, id: HostId) -> Option<&FilterEntry> {
        self.entries.iter().find(|e| e.host.id() == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Construction order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FilterEntry> {
        self.entries.iter_mut()
    }

    pub fn renderers_mut(&mut self) -> impl Iterator<Item = &mut FilterEntry> {
        self.entries
            .iter_mut()
            .filter(|e| e.filter.role().is_renderer())
    }

    /// Stop every filter, newest first.
    ///
    /// Each host is invalidated before its filter is stopped. Returns the
    /// roles in the order they were torn down.
    pub fn teardown(&mut self) -> Vec<FilterRole> {
        let mut order = Vec::with_capacity(self.entries.len());
        while let Some(mut entry) = self.entries.pop() {
            entry.host.invalidate();
            debug!(
                "FilterGraph: stopping {} ({})",
                entry.filter.role(),
                entry.filter.name()
            );
            entry.filter.stop();
            order.push(entry.filter.role());
        }
        order
    }
}

impl Drop for FilterGraph {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::controller::ControlMsg;
    use crate::pipeline::filter::{MediaFilter, MediaStream, Renderer};
    use crate::pipeline::shared::SharedCell;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    struct Recording {
        name: &'static str,
        stops: Arc<Mutex<Vec<&'static str>>>,
    }

    impl MediaFilter for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn stop(&mut self) {
            self.stops.lock().unwrap().push(self.name);
        }
    }

    impl Renderer for Recording {
        fn initialize(&mut self, _stream: Arc<dyn MediaStream>, _host: FilterHost) {}
    }

    #[test]
    fn test_teardown_reverse_order_and_role_unique() {
        let shared = Arc::new(SharedCell::new(1.0, 0.0));
        let (tx, _rx) = mpsc::unbounded_channel::<ControlMsg>();
        let stops = Arc::new(Mutex::new(Vec::new()));
        let make = |name| Recording {
            name,
            stops: stops.clone(),
        };

        let mut graph = FilterGraph::new();
        let audio_host = FilterHost::new(1, FilterRole::AudioRenderer, shared.clone(), tx.clone());
        let video_host = FilterHost::new(2, FilterRole::VideoRenderer, shared.clone(), tx.clone());
        assert!(graph
            .push(Filter::AudioRenderer(Box::new(make("audio"))), audio_host.clone())
            .is_ok());
        assert!(graph
            .push(Filter::VideoRenderer(Box::new(make("video"))), video_host.clone())
            .is_ok());

        let duplicate = FilterHost::new(3, FilterRole::AudioRenderer, shared.clone(), tx.clone());
        assert!(graph
            .push(Filter::AudioRenderer(Box::new(make("again"))), duplicate)
            .is_err());
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.find_host(2).map(|e| e.filter.name()), Some("video"));

        let order = graph.teardown();
        assert_eq!(order, vec![FilterRole::VideoRenderer, FilterRole::AudioRenderer]);
        assert_eq!(*stops.lock().unwrap(), vec!["video", "audio"]);
        assert!(!audio_host.is_valid());
        assert!(!video_host.is_valid());
        assert!(graph.is_empty());
    }
}
