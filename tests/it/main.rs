mod array;
mod io;
