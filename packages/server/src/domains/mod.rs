// Domain layers - business entities behind the kernel infrastructure

pub mod presentations;
