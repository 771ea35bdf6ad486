use db::event::Event;

#[derive(Debug, Clone, Copy)]
pub struct EventRef(pub i64);

impl From<&Event> for EventRef {
    fn from(event: &Event) -> Self {
        EventRef(event.id)
    }
}
