pub mod ride_controller;
pub mod ride_socket_controller;

pub use ride_controller::RideController;
pub use ride_socket_controller::RideSocketController;
