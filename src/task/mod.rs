//! Tasks that make up the firmware as well as the resources and messages they share.
pub mod alarm_cycle;
pub mod buttons;
pub mod cloud;
pub mod display;
pub mod hub_socket;
pub mod resources;
pub mod sensor;
pub mod sound;
pub mod task_messages;
