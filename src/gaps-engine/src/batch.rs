use gaps_types::{CollectionId, EventKind, GranuleEvent};

/// One collection's worth of same-kind events from a single batch.
pub struct EventGroup {
    pub collection_id: CollectionId,
    pub kind: EventKind,
    pub events: Vec<GranuleEvent>,
}

/// Groups a batch by collection id, preserving arrival order within each
/// group. §4.4's transaction discipline operates one group at a time, so
/// a group's internal order is the only order that matters.
pub fn group_by_collection(events: Vec<GranuleEvent>) -> Vec<EventGroup> {
    let mut groups: Vec<EventGroup> = Vec::new();
    for event in events {
        if let Some(group) = groups
            .iter_mut()
            .find(|g| g.collection_id == event.collection_id)
        {
            group.events.push(event);
        } else {
            groups.push(EventGroup {
                collection_id: event.collection_id.clone(),
                kind: event.kind,
                events: vec![event],
            });
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(cid: &str, id: &str, kind: EventKind) -> GranuleEvent {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        GranuleEvent {
            message_id: id.to_string(),
            collection_id: CollectionId::new(cid, "1"),
            begin: t,
            end: t,
            kind,
        }
    }

    #[test]
    fn groups_preserve_arrival_order_and_split_by_collection() {
        let events = vec![
            event("A", "1", EventKind::Ingest),
            event("B", "2", EventKind::Ingest),
            event("A", "3", EventKind::Ingest),
        ];
        let groups = group_by_collection(events);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].events.len(), 2);
        assert_eq!(groups[0].events[0].message_id, "1");
        assert_eq!(groups[0].events[1].message_id, "3");
        assert_eq!(groups[1].events.len(), 1);
    }
}
