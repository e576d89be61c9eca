mod chainback;
mod content_objects;
mod multichannelling;
mod session;
