fn main() {
    lash::cli::run();
}
