mod correlation;
mod job;
mod transport;
