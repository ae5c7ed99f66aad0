mod file;
mod stream;
