mod connector;
mod framing;
