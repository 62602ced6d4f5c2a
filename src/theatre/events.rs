/// Notifications sent to [`Theatre::subscribe`](crate::Theatre::subscribe) receivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TheatreEvent {
    SceneChanged {
        stage: String,
        scene: String,
        animated: bool,
    },
}
