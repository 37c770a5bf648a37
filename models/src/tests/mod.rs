mod message;
mod start_download;
