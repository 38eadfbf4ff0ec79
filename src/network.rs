pub mod stream_acceptor;

pub use stream_acceptor::StreamAcceptor;
