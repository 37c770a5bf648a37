mod bridge;
mod helpers;
mod pairing;
mod transport;
