mod ipc;
